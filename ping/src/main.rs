use raw_ip_ping_request::configuration::PingConfiguration;
use raw_ip_ping_request::ping::{ping, PingError, PingRecord};
use std::net::Ipv4Addr;

fn load_configuration(args: &[String]) -> PingConfiguration {
    match args.iter().position(|a| a == "--config") {
        Some(pos) => {
            let data = std::fs::read_to_string(&args[pos + 1]).unwrap();
            PingConfiguration::from_json(&data).unwrap()
        }
        None => PingConfiguration::from_args(args).unwrap(),
    }
}

fn print_record(record: &PingRecord, json: bool) {
    if json {
        let line = match &record.result {
            Ok(rtt) => serde_json::json!({
                "seq": record.sequence,
                "rttMs": rtt.as_secs_f64() * 1000.0,
            }),
            Err(error) => serde_json::json!({
                "seq": record.sequence,
                "error": format!("{:?}", error),
            }),
        };
        println!("{}", line);
        return;
    }
    match &record.result {
        Ok(rtt) => println!("Ping {} RTT {} sec", record.sequence, rtt.as_secs_f64()),
        Err(PingError::Timeout) => println!("Ping {} Request timed out.", record.sequence),
        Err(error) => println!("Ping {} {:?}", record.sequence, error),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let target: Ipv4Addr = args[1].parse().unwrap();
    let conf = load_configuration(&args);
    let json = args.iter().any(|a| a == "--json");

    if !json {
        println!("Pinging {} {} times:", target, conf.repeat);
    }
    let last = ping(target, &conf, |record| print_record(&record, json));
    match last {
        Ok(rtt) => println!("Last RTT: {:?}", rtt),
        Err(PingError::PermissionDenied) => {
            eprintln!("Raw ICMP sockets need elevated privilege; run as root.");
            std::process::exit(1);
        }
        Err(error) => println!("Last attempt failed: {:?}", error),
    }
}
