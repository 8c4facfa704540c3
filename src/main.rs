fn main() {
    repofs::app::cli::run();
}
