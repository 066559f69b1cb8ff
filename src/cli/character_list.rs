use crate::core::builtin_characters::load_builtin_characters;

pub fn list_characters() {
    println!("Available characters:\n");

    for (index, character) in load_builtin_characters().iter().enumerate() {
        let marker = if index == 0 { " (default)" } else { "" };
        println!("  • {} — {}{}", character.id, character.display_name, marker);
    }

    println!("\n💡 Talk to a character with:");
    println!("   chatterbox -c <id>");
}
