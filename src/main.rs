fn main() -> color_eyre::Result<()> {
    kuba::cli::main()
}
