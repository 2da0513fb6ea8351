use raw_ip_ping_request::configuration::TracerouteConfiguration;
use raw_ip_ping_request::traceroute::{trace_route, HopKind, HopRecord, PingError};
use std::net::Ipv4Addr;

fn load_configuration(args: &[String]) -> TracerouteConfiguration {
    match args.iter().position(|a| a == "--config") {
        Some(pos) => {
            let data = std::fs::read_to_string(&args[pos + 1]).unwrap();
            TracerouteConfiguration::from_json(&data).unwrap()
        }
        None => TracerouteConfiguration::from_args(args).unwrap(),
    }
}

fn print_record(record: &HopRecord, json: bool) {
    if json {
        let line = match &record.result {
            Ok(node) => serde_json::json!({
                "ttl": record.ttl,
                "try": record.attempt,
                "router": node.addr.to_string(),
                "rttMs": node.latency.as_secs_f64() * 1000.0,
                "reached": node.kind == HopKind::Destination,
            }),
            Err(error) => serde_json::json!({
                "ttl": record.ttl,
                "try": record.attempt,
                "error": format!("{:?}", error),
            }),
        };
        println!("{}", line);
        return;
    }
    match &record.result {
        Ok(node) => println!(
            " {} rtt={:.0} ms {}",
            record.ttl,
            node.latency.as_secs_f64() * 1000.0,
            node.addr
        ),
        Err(PingError::Timeout) => println!(" * * * Request timed out."),
        Err(error) => println!(" {} error {:?}", record.ttl, error),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let target: Ipv4Addr = args[1].parse().unwrap();
    let conf = load_configuration(&args);
    let json = args.iter().any(|a| a == "--json");

    if !json {
        println!(
            "Tracing route to {} over at most {} hops:",
            target,
            conf.max_hops - 1
        );
    }
    match trace_route(target, &conf, |record| print_record(&record, json)) {
        Ok(Some(node)) => {
            if !json {
                println!("Destination {} reached.", node.addr);
            }
        }
        Ok(None) => {
            if !json {
                println!("Destination not reached within {} hops.", conf.max_hops - 1);
            }
        }
        Err(PingError::PermissionDenied) => {
            eprintln!("Raw ICMP sockets need elevated privilege; run as root.");
            std::process::exit(1);
        }
        Err(error) => {
            eprintln!("Traceroute failed: {:?}", error);
            std::process::exit(1);
        }
    }
}
