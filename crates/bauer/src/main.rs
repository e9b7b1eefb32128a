fn main() {
    if let Err(err) = bauer::run() {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<bauer_sdk::BauerError>()
            .map(bauer_sdk::BauerError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
