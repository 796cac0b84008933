use ructe::{Ructe, RucteError};

fn main() -> Result<(), RucteError> {
    Ructe::from_env()?.compile_templates("templates")
}
