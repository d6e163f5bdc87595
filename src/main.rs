use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    pybuddy::cli::main()
}
