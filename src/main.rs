use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    quire::cli::main()
}
