fn main() {
    lerobot_pipeline::cli::run();
}
