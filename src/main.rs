fn main() -> anyhow::Result<()> {
    safecalc_lib::run()
}
