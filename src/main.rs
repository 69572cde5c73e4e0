//! MoneroPOS - Point-of-Sale Terminal
//!
//! One payment per invocation:
//!
//! ```text
//! ┌────────────┐    ┌──────────────┐    ┌────────────┐
//! │  Initiate  │───▶│  Reconcile   │───▶│  Receipt   │
//! │  (HTTP)    │    │ WS+Poll+CB   │    │ (exactly 1)│
//! └────────────┘    └──────────────┘    └────────────┘
//! ```
//!
//! The terminal prints the payment URI, streams status lines while the
//! customer pays, and exits after the completion receipt or Ctrl-C.

use std::sync::Arc;

use moneropos::callback::{CallbackListener, CallbackRegistry};
use moneropos::moneropay::{MoneroPayClient, PaymentGateway, StatusStreamClient};
use moneropos::payment::{PaymentReconciler, PaymentRequest};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Amount to collect in piconero (--amount)
fn get_amount() -> u64 {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--amount" && i + 1 < args.len() {
            if let Ok(amount) = args[i + 1].parse() {
                return amount;
            }
        }
    }
    1_000_000_000_000
}

fn get_description() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--description" && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "MoneroPOS sale".to_string()
}

fn get_fiat() -> f64 {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--fiat" && i + 1 < args.len() {
            if let Ok(fiat) = args[i + 1].parse() {
                return fiat;
            }
        }
    }
    0.0
}

fn get_rate() -> f64 {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--rate" && i + 1 < args.len() {
            if let Ok(rate) = args[i + 1].parse() {
                return rate;
            }
        }
    }
    0.0
}

/// Get callback port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

// ============================================================
// MAIN
// ============================================================

fn main() {
    let env = get_env();
    let app_config = moneropos::config::AppConfig::load(&env);
    let _log_guard = moneropos::logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting MoneroPOS terminal in {} mode",
        env
    );

    println!("=== MoneroPOS: Payment Terminal ===");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let gateway = match MoneroPayClient::new(&app_config.moneropay) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                eprintln!("❌ FATAL: {}", e);
                std::process::exit(1);
            }
        };

        match gateway.health().await {
            Ok(h) if h.status == 200 => {
                println!("✅ MoneroPay reachable at {}", gateway.base_url());
            }
            Ok(h) => println!("⚠️ MoneroPay degraded (status {})", h.status),
            Err(e) => println!("⚠️ MoneroPay health check failed: {}", e),
        }

        let registry = Arc::new(CallbackRegistry::new());
        let stream = StatusStreamClient::new(&app_config.moneropay.base_url);
        let (reconciler, mut completions) = PaymentReconciler::new(
            gateway.clone(),
            stream,
            registry.clone(),
            &app_config.payment,
            &app_config.callback,
        );

        let mut listener_config = app_config.callback.clone();
        if let Some(port) = get_port_override() {
            listener_config.port = port;
        }
        let listener = CallbackListener::new(registry.clone(), reconciler.event_sender());
        tokio::spawn(async move {
            if let Err(e) = listener.run(&listener_config).await {
                eprintln!("❌ FATAL: {}", e);
                std::process::exit(1);
            }
        });

        let request = PaymentRequest {
            amount: get_amount(),
            description: get_description(),
            fiat_value: get_fiat(),
            exchange_rate: get_rate(),
        };

        let handle = match reconciler.start(request).await {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("❌ FATAL: {}", e);
                std::process::exit(1);
            }
        };

        println!("\n💳 Receive created");
        println!("   address: {}", handle.transaction_id);
        println!("   uri:     {}", handle.payment_uri());
        println!("   required confirmations: {}", handle.required_confirmations);
        println!("⏳ Waiting for payment...");

        let mut status_rx = reconciler.subscribe_status();
        tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                let snapshot = status_rx.borrow_and_update().clone();
                if let Some(s) = snapshot {
                    println!(
                        "   covered {}/{} piconero ({} confirmation(s))",
                        s.covered_total, s.expected, s.confirmations
                    );
                }
            }
        });

        tokio::select! {
            result = completions.recv() => {
                if let Some(receipt) = result {
                    println!("\n✅ Payment complete: {} XMR", receipt.xmr());
                    if receipt.fiat_value > 0.0 {
                        println!("   {:.2} @ {:.4} fiat/XMR", receipt.fiat_value, receipt.exchange_rate);
                    }
                    if let Some(tx_hash) = &receipt.tx_hash {
                        println!("   tx: {}", tx_hash);
                    }
                    println!("   confirmations: {}", receipt.confirmations);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n⚠️ Cancelled by operator");
                reconciler.stop().await;
            }
        }

        let stats = reconciler.stats().await;
        tracing::info!(
            discarded_events = stats.discarded_events,
            poll_failures = stats.poll_failures,
            "Session diagnostics"
        );
    });

    tracing::info!("MoneroPOS terminal shut down");
}
