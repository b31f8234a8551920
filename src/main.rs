use mesh_led_control::console::Console;
use mesh_led_control::core::Config;
use mesh_led_control::network::MulticastSocket;
use mesh_led_control::node::{select_role, Node, TriggerHandle};
use mesh_led_control::util::{logging, runtime};
use tracing::{error, info};

/// Path of an optional JSON configuration file
const CONFIG_ENV: &str = "MESH_LED_CONFIG";

fn main() {
    logging::init();

    // Stdin is read on the blocking pool; do not wait for that read on exit.
    if let Err(e) = runtime::block_on_detached(run()).and_then(|result| result) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> mesh_led_control::Result<()> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            info!(path = ?path, "loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };

    let mut console = Console::spawn(tokio::io::stdin(), tokio::io::stdout(), config.console_line_limit);
    let role = select_role(&mut console).await?;

    let socket = MulticastSocket::bind(&config)?;
    info!(local = %socket.local_addr()?, group = %socket.group(), "listening");

    let mut node = Node::new(config, role, socket, console);
    forward_signals(node.handle());

    node.run().await
}

/// Ctrl-C stops the node; on unix SIGUSR1 acts as the trigger button
fn forward_signals(handle: TriggerHandle) {
    #[cfg(unix)]
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut usr1 = match signal(SignalKind::user_defined1()) {
                Ok(usr1) => usr1,
                Err(e) => {
                    error!("could not install SIGUSR1 handler: {}", e);
                    return;
                }
            };
            while usr1.recv().await.is_some() {
                if !handle.trigger() {
                    info!("trigger dropped, node busy");
                }
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            handle.shutdown();
        }
    });
}
