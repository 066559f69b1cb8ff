use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    chatterbox::cli::main()
}
