fn main() {
    std::process::exit(git_upstream::cli::run());
}
