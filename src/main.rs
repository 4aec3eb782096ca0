fn main() {
    match spreadsheet_rescue::run() {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
