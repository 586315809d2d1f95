use anyhow::{Context, bail};
use ballot::payloads::{Reply, Results, VoteRequest};
use clap::Parser;
use reqwest::{Client, StatusCode};
use tokio::task::JoinSet;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long, default_value_t = 100)]
    voters: u32,

    /// Fixed option for every vote, otherwise votes rotate through all options.
    #[arg(long)]
    option: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client::new();

    let before = fetch_results(&client, &args.url).await?;
    let options = before.resultados.len() as i64;
    if options == 0 {
        bail!("server has no options");
    }

    println!("Options: {options}");
    println!("Total before: {}\n", before.total);

    // distinct run prefix so reruns against the same database don't collide
    let run = std::process::id();

    let mut votes = JoinSet::new();
    for i in 0..args.voters {
        let client = client.clone();
        let url = args.url.clone();
        let option_id = args.option.unwrap_or(i as i64 % options + 1);
        let identity = identity(run, i);

        votes.spawn(async move { vote(&client, &url, &identity, option_id).await });
    }

    let mut accepted = 0;
    while let Some(result) = votes.join_next().await {
        let (status, _) = result??;
        if status == StatusCode::OK {
            accepted += 1;
        } else {
            println!("Unexpected status: {status}");
        }
    }

    println!("Accepted: {accepted}/{}", args.voters);

    let race_identity = format!("race-{run}");
    let (first, second) = tokio::join!(
        vote(&client, &args.url, &race_identity, 1),
        vote(&client, &args.url, &race_identity, 1),
    );
    let mut race = [first?.0, second?.0];
    race.sort();
    println!("Same identity race: {} / {}", race[0], race[1]);

    let after = fetch_results(&client, &args.url).await?;
    let expected = before.total + u64::from(args.voters) + 1;

    println!("\nTotal after: {}", after.total);
    for option in &after.resultados {
        println!("{:>3} {:<20} {}", option.id, option.nombre, option.cantidad);
    }

    if race != [StatusCode::OK, StatusCode::CONFLICT] {
        bail!("same identity race returned {race:?}");
    }

    if after.total != expected {
        bail!("expected total {expected}, got {}", after.total);
    }

    println!("\nConservation holds");
    Ok(())
}

fn identity(run: u32, i: u32) -> String {
    format!("10.{}.{}.{}-{run}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff)
}

async fn vote(
    client: &Client,
    url: &str,
    identity: &str,
    option_id: i64,
) -> anyhow::Result<(StatusCode, Reply)> {
    let response = client
        .post(format!("{url}/votar"))
        .header(FORWARDED_FOR, identity)
        .json(&VoteRequest { option_id })
        .send()
        .await
        .context("vote request failed")?;

    let status = response.status();
    let reply = response.json().await.context("malformed vote reply")?;

    Ok((status, reply))
}

async fn fetch_results(client: &Client, url: &str) -> anyhow::Result<Results> {
    client
        .get(format!("{url}/resultados"))
        .send()
        .await
        .context("results request failed")?
        .error_for_status()?
        .json()
        .await
        .context("malformed results")
}
