use anyhow::Result;
use board_core::views::CardSort;
use board_core::{BoardClient, BoardClientOptions};
use clap::Parser;
use shared::domain::{CardId, ColumnId};
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: String,
    /// Move a card to a column before printing: --move-card <CARD_ID> <COLUMN_ID>
    #[arg(long, num_args = 2, value_names = ["CARD_ID", "COLUMN_ID"])]
    move_card: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let client = BoardClient::new(BoardClientOptions::new(args.server_url.clone()));
    client.refresh().await?;

    if let Some(move_args) = &args.move_card {
        let card_id = CardId(move_args[0].parse::<Uuid>()?);
        let column_id = ColumnId(move_args[1].clone());
        client.move_card(card_id, column_id).await?;
        client.ensure_fresh_cards().await?;
    }

    for column in client.columns().await {
        println!("{} ({})", column.title, column.id);
        let cards = client.column_cards(&column.id, CardSort::BoardOrder).await;
        if cards.is_empty() {
            println!("  (empty)");
        }
        for card in cards {
            let assignee = card.assignee.as_deref().unwrap_or("unassigned");
            println!("  [{}] {} (assignee: {assignee})", card.id, card.title);
        }
    }
    Ok(())
}
