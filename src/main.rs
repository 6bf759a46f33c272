fn main() -> std::process::ExitCode {
    playlist_relay::run()
}
