use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    interface_java::run().await
}
