#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    poctl::Args::parse_and_run().await
}
