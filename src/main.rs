fn main() {
    if let Err(err) = food_insecurity_etl::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
