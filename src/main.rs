fn main() -> anyhow::Result<()> {
    outline_tui::cli::run()
}
