use obsreport_core::{OBSERVABLES, ReportKind};

pub fn run(json: bool) {
    if json {
        let value = serde_json::json!({
            "reports": ReportKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "observables": OBSERVABLES
                .iter()
                .enumerate()
                .map(|(i, o)| serde_json::json!({"index": i, "name": o.name, "description": o.description}))
                .collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&value) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("Reports:");
    for kind in ReportKind::ALL {
        println!("  {kind}");
    }
    println!("\nObservables:");
    for (i, o) in OBSERVABLES.iter().enumerate() {
        println!("  {i:>2}  {:<14} {}", o.name, o.description);
    }
}
