fn main() {
    joint_pipeline::cli::run();
}
