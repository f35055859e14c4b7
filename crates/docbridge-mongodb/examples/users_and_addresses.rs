//! Users and addresses example
//!
//! Run this example with:
//! ```
//! # Terminal 1: Start a MongoDB server
//! docker run --rm -p 27017:27017 mongo
//!
//! # Terminal 2: Run the example
//! MONGODB_DATABASE=my_database cargo run -p docbridge-mongodb --example users_and_addresses
//! ```

use anyhow::{bail, Context};
use bson::doc;
use chrono::{DateTime, Utc};
use docbridge_mongodb::{Client, ClientConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    last: String,
    mobile: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Address {
    #[serde(rename = "userId")]
    user_id: String,
    addr: String,
}

fn user(id: &str, name: &str, last: &str, mobile: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        last: last.to_string(),
        mobile: mobile.to_string(),
        joined_at: Utc::now(),
    }
}

async fn insert_many(client: &Client) -> anyhow::Result<()> {
    let users = vec![
        user("1000", "name 1", "last 1", "222=3333333"),
        user("1001", "name 2", "last 2", "555=6666666"),
    ];
    let addresses = vec![
        Address {
            user_id: "1000".to_string(),
            addr: "my address 1".to_string(),
        },
        Address {
            user_id: "1001".to_string(),
            addr: "my address 2".to_string(),
        },
    ];

    let result = client.insert_many("users", users, None).await?;
    println!("Inserted {} users", result.inserted_ids.len());

    let result = client.insert_many("address", addresses, None).await?;
    println!("Inserted {} addresses", result.inserted_ids.len());
    Ok(())
}

async fn insert_one(client: &Client) -> anyhow::Result<()> {
    let result = client
        .insert_one("users", user("1004", "name 4", "last 4", "999=1111111"), None)
        .await?;
    println!("Inserted user with _id {}", result.inserted_id);
    Ok(())
}

async fn find_user_address(client: &Client, user_id: &str) -> anyhow::Result<()> {
    // Both lookups run concurrently on their own tasks.
    let user = client.spawn_find_one::<User>("users", doc! { "id": user_id }, None);
    let address = client.spawn_find_one::<Address>("address", doc! { "userId": user_id }, None);

    let (user, address) = (user.await, address.await);
    let (user, address) = (
        user.context("failed to fetch user")?,
        address.context("failed to fetch address")?,
    );

    let Some(user) = user else {
        bail!("user {} not found", user_id);
    };
    let Some(address) = address else {
        bail!("address of user {} not found", user_id);
    };

    println!("Found user:\n{}", serde_json::to_string_pretty(&user)?);
    println!("Address: {}", address.addr);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()
        .unwrap_or_else(|_| ClientConfig::new("mongodb://127.0.0.1", "my_database"))
        .with_timeout(Duration::from_secs(60));
    let client = Client::with_config(config)?;

    if !client.ping().await {
        bail!("server at {} did not answer ping", client.uri());
    }

    insert_many(&client).await?;
    insert_one(&client).await?;
    find_user_address(&client, "1000").await?;

    Ok(())
}
