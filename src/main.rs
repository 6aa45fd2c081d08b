use anyhow::Context;

fn main() -> anyhow::Result<()> {
    backdrop::run().context("backdrop failed")
}
