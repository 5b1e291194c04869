use anyhow::Result;

fn main() -> Result<()> {
    private_tmpdir::cli::run()
}
