fn main() -> std::process::ExitCode {
    creatorflow_lib::run()
}
