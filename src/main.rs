fn main() {
    if let Err(err) = order_kpis::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
