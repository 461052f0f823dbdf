fn main() -> anyhow::Result<()> {
    nimbusd_cmd::cmd::main()
}
