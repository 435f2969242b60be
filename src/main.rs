use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    gh_pages::run().await
}
