use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use shared::{ClientEvent, CollectibleView, PlayerInit, PlayerUpdate, ServerEvent};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const NAMES: [&str; 10] = [
    "Oakley", "Luna", "Charlie", "Bailey", "Scout", "Harley", "Mochi", "Pepper", "Ziggy", "Sunny",
];
const HATS: [&str; 5] = ["none", "party", "beret", "cowboy", "crown"];

/// Headless client: joins a world, wanders a little, chews the first free collectible
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket endpoint of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,
    /// World to join
    #[clap(short, long, default_value = "pack")]
    world: String,
    /// Seconds to stay connected
    #[clap(short, long, default_value = "10")]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (socket, _) = connect_async(args.url.as_str()).await?;
    println!("Connected to {}", args.url);
    let (mut sink, mut stream) = socket.split();

    let player = {
        let mut rng = rand::thread_rng();
        PlayerInit {
            name: NAMES[rng.gen_range(0..NAMES.len())].to_string(),
            color: "#c68642".to_string(),
            collar: "#ff6b6b".to_string(),
            hat: HATS[rng.gen_range(0..HATS.len())].to_string(),
            ..Default::default()
        }
    };
    println!("Joining world '{}' as {}", args.world, player.name);

    let join = ClientEvent::JoinWorld {
        world_name: args.world.clone(),
        player,
        level_name: None,
    };
    sink.send(Message::Text(join.to_json()?)).await?;

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut position: Option<(f32, f32)> = None;
    let mut step = 0u32;

    loop {
        tokio::select! {
            _ = sleep(Duration::from_millis(250)) => {
                if Instant::now() >= deadline {
                    break;
                }
                // Walk in a slow circle around wherever we spawned
                if let Some((x, y)) = position {
                    let angle = step as f32 / 4.0;
                    let update = PlayerUpdate {
                        x: Some(x + angle.cos() * 40.0),
                        y: Some(y + angle.sin() * 40.0),
                        facing: Some(angle),
                    };
                    sink.send(Message::Text(ClientEvent::UpdatePlayer(update).to_json()?)).await?;
                    step += 1;
                }
            }
            message = stream.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        println!("Connection error: {}", e);
                        break;
                    }
                    None => {
                        println!("Server closed the connection");
                        break;
                    }
                };

                match ServerEvent::from_json(&text) {
                    Ok(ServerEvent::WorldData { self_id, players, collectibles, level_name }) => {
                        println!(
                            "World data: we are {} on level '{}', {} players, {} collectibles",
                            self_id,
                            level_name,
                            players.len(),
                            collectibles.len()
                        );
                        position = players.iter().find(|p| p.id == self_id).map(|p| (p.x, p.y));
                        if let Some(target) = collectibles.iter().find(|c| c.is_available()) {
                            println!("Starting to eat '{}' (tags {:?})", target.id, target.tags);
                            sink.send(Message::Text(eat(target).to_json()?)).await?;
                        }
                    }
                    Ok(event) => println!("Event: {:?}", event),
                    Err(e) => println!("Failed to decode server event: {}", e),
                }
            }
        }
    }

    sink.send(Message::Close(None)).await?;
    println!("Test client finished");
    Ok(())
}

fn eat(target: &CollectibleView) -> ClientEvent {
    ClientEvent::StartEating {
        collectible_id: target.id.clone(),
    }
}
