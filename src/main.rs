//! Mangia Eats terminal chat
//!
//! Thin interactive frontend over the client library: plain lines go to
//! the assistant, `/order <id>` looks up an order, `/clear` drops the
//! tracked order id, `/quit` exits.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mangia_client::{ApiClient, ChatError, Config, LookupError, OrderDetails, OrderLookup, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mangia_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let api = Arc::new(ApiClient::new(&config));

    if !api.health().await {
        eprintln!("warning: backend at {} is not responding", api.base_url());
    }

    let lookup = OrderLookup::new(api.clone());
    let mut sessions = SessionManager::new(api, config);
    let session_id = sessions.create();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    {
        let session = sessions.get_mut(session_id).expect("session just created");
        let welcome = session.controller.conversation().last().expect("welcome turn");
        stdout
            .write_all(format!("assistant: {}\n> ", welcome.content).as_bytes())
            .await?;
        stdout.flush().await?;
    }

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        let session = sessions.get_mut(session_id).expect("session exists");

        let output = if input == "/quit" {
            break;
        } else if input == "/clear" {
            session.controller.clear_order();
            "order id cleared".to_string()
        } else if let Some(raw) = input.strip_prefix("/order ") {
            match raw.trim().parse::<i64>() {
                Ok(id) => match lookup.lookup(id).await {
                    Ok(order) => render_order(&order),
                    Err(LookupError::NotFound(id)) => format!("order {id} not found"),
                    Err(LookupError::Api(e)) => format!("lookup failed: {e}"),
                },
                Err(_) => "usage: /order <numeric id>".to_string(),
            }
        } else {
            match session.controller.send(input).await {
                Ok(message) => format!("assistant: {}", message.content),
                Err(ChatError::InputBlocked) => {
                    "your concern has been prioritized; please wait for an agent".to_string()
                }
                Err(ChatError::RequestInFlight) => {
                    "still sending the previous message".to_string()
                }
            }
        };

        stdout.write_all(format!("{output}\n> ").as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn render_order(order: &OrderDetails) -> String {
    let mut out = format!(
        "order #{} [{}] for {}\n  deliver to: {}\n",
        order.order_id, order.status, order.customer_name, order.delivery_address
    );
    for item in &order.items {
        out.push_str(&format!(
            "  {}x {} (${:.2}) = ${:.2}\n",
            item.quantity, item.name, item.price, item.total
        ));
    }
    out.push_str(&format!(
        "  subtotal ${:.2} + delivery ${:.2} + tax ${:.2} = ${:.2}",
        order.total_amount, order.delivery_charge, order.tax, order.final_amount
    ));
    if let Some(delivery) = &order.delivery {
        out.push_str(&format!(
            "\n  courier {} eta {}",
            delivery.delivery_person, delivery.estimated_time
        ));
    }
    out
}
