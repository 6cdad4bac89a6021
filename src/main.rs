// src/main.rs

use herd::{cli, run};

#[tokio::main]
async fn main() {
    match run(cli::parse()).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("herd error: {err:?}");
            std::process::exit(1);
        }
    }
}
