use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use satellite_tools::config::Overrides;
use satellite_tools::led::{self, BOOT_FLASH_HOLD, LedBackend, MAX_BRIGHTNESS};
use satellite_tools::mqtt::{MqttPublisher, run_subscriber};
use satellite_tools::server::{EventServer, ServerUri, drain_events};
use satellite_tools::shutdown::wait_for_shutdown;
use satellite_tools::{Config, LedDispatcher, LedSink, PublishDispatcher, SubscriberDispatcher};

/// Satellite Tools - LED feedback and MQTT bridging for voice satellites
#[derive(Parser)]
#[command(name = "satellite-tools", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Enable debug logging (same as -v)
    #[arg(long, env = "SATELLITE_DEBUG", global = true)]
    debug: bool,

    /// Config file (default: ~/.config/satellite-tools/config.toml)
    #[arg(long, env = "SATELLITE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the LED ring directly from satellite events
    Leds {
        /// Event server address (tcp://host:port or unix:///path)
        #[arg(long, env = "SATELLITE_EVENT_URI")]
        uri: ServerUri,

        #[command(flatten)]
        led: LedArgs,
    },
    /// Publish satellite events to MQTT
    Publish {
        /// Event server address (tcp://host:port or unix:///path)
        #[arg(long, env = "SATELLITE_EVENT_URI")]
        uri: ServerUri,

        /// Satellite name (defaults to the hostname)
        #[arg(long, env = "SATELLITE_NAME")]
        name: Option<String>,

        #[command(flatten)]
        mqtt: MqttArgs,
    },
    /// Drive the LED ring from MQTT messages for one satellite
    Subscribe {
        /// Satellite name (defaults to the hostname)
        #[arg(long, env = "SATELLITE_NAME")]
        name: Option<String>,

        #[command(flatten)]
        mqtt: MqttArgs,

        #[command(flatten)]
        led: LedArgs,
    },
}

#[derive(Args)]
struct MqttArgs {
    /// MQTT broker host
    #[arg(long, env = "SATELLITE_MQTT_HOST")]
    mqtt_host: Option<String>,

    /// MQTT broker port [default: 1883]
    #[arg(long, env = "SATELLITE_MQTT_PORT")]
    mqtt_port: Option<u16>,

    /// MQTT username
    #[arg(long, env = "SATELLITE_MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password
    #[arg(long, env = "SATELLITE_MQTT_PASSWORD", hide_env_values = true)]
    mqtt_password: Option<String>,

    /// Topic prefix [default: wyoming-satellite]
    #[arg(long, env = "SATELLITE_MQTT_TOPIC_PREFIX")]
    topic_prefix: Option<String>,
}

#[derive(Args)]
struct LedArgs {
    /// LED backend [default: log]
    #[arg(long, value_enum, env = "SATELLITE_LED_BACKEND")]
    led_backend: Option<LedBackend>,

    /// Ring brightness (0x00 to 0x1F)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_BRIGHTNESS)))]
    brightness: Option<u8>,

    /// Skip the startup flash
    #[arg(long)]
    no_boot_flash: bool,
}

impl MqttArgs {
    fn apply(self, overrides: &mut Overrides) {
        overrides.mqtt_host = self.mqtt_host;
        overrides.mqtt_port = self.mqtt_port;
        overrides.mqtt_username = self.mqtt_username;
        overrides.mqtt_password = self.mqtt_password;
        overrides.topic_prefix = self.topic_prefix;
    }
}

impl LedArgs {
    fn apply(self, overrides: &mut Overrides) {
        overrides.led_backend = self.led_backend;
        overrides.brightness = self.brightness;
        overrides.no_boot_flash = self.no_boot_flash;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = cli.verbose.max(u8::from(cli.debug));
    let filter = match level {
        0 => "info,satellite_tools=info",
        1 => "info,satellite_tools=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut overrides = Overrides::default();
    let command = match cli.command {
        Command::Leds { uri, led } => {
            led.apply(&mut overrides);
            Mode::Leds { uri }
        }
        Command::Publish { uri, name, mqtt } => {
            overrides.name = name;
            mqtt.apply(&mut overrides);
            Mode::Publish { uri }
        }
        Command::Subscribe { name, mqtt, led } => {
            overrides.name = name;
            mqtt.apply(&mut overrides);
            led.apply(&mut overrides);
            Mode::Subscribe
        }
    };

    let config = Config::load(cli.config.as_deref(), &overrides)?;
    tracing::debug!(?config, "loaded configuration");

    match command {
        Mode::Leds { uri } => run_leds(&config, &uri).await,
        Mode::Publish { uri } => run_publish(&config, &uri).await,
        Mode::Subscribe => run_subscribe(&config).await,
    }
}

enum Mode {
    Leds { uri: ServerUri },
    Publish { uri: ServerUri },
    Subscribe,
}

/// Direct mode: satellite events straight to the LED ring
async fn run_leds(config: &Config, uri: &ServerUri) -> anyhow::Result<()> {
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let Some(led) = open_led(config, &mut shutdown).await? else {
        return Ok(());
    };
    let mut dispatcher = LedDispatcher::new(led, config.revert_delay);

    let mut server = match EventServer::bind(uri).await {
        Ok(server) => server,
        Err(e) => {
            dispatcher.shutdown();
            return Err(e.into());
        }
    };

    tracing::info!(%uri, "driving LEDs from satellite events");
    drain_events(&mut server, shutdown, |event| {
        dispatcher.on_event(event);
    })
    .await;

    drop(server);
    dispatcher.shutdown();
    tracing::info!("shutdown complete");
    Ok(())
}

/// Publisher mode: satellite events to the MQTT bridge
async fn run_publish(config: &Config, uri: &ServerUri) -> anyhow::Result<()> {
    let satellite_id = config.satellite_id()?;
    let mqtt = config.require_mqtt()?;

    let mut server = EventServer::bind(uri).await?;
    let (publisher, driver) = MqttPublisher::connect(mqtt);
    let dispatcher = PublishDispatcher::new(
        Arc::new(publisher),
        satellite_id.clone(),
        config.topics.clone(),
    );

    tracing::info!(%uri, satellite = %satellite_id, "publishing satellite events");
    drain_events(&mut server, wait_for_shutdown(), |event| {
        dispatcher.on_event(event);
    })
    .await;

    drop(server);
    driver.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Subscriber mode: bridge messages for this satellite to the LED ring
async fn run_subscribe(config: &Config) -> anyhow::Result<()> {
    let satellite_id = config.satellite_id()?;
    let mqtt = config.require_mqtt()?;

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let Some(led) = open_led(config, &mut shutdown).await? else {
        return Ok(());
    };
    let mut dispatcher = SubscriberDispatcher::new(
        led,
        config.revert_delay,
        satellite_id,
        config.topics.clone(),
    );

    let result = run_subscriber(mqtt, &mut dispatcher, shutdown).await;
    dispatcher.shutdown();
    tracing::info!("shutdown complete");
    Ok(result?)
}

/// Open the LED ring and show the startup flash
///
/// Returns `None` if shutdown was requested during the flash; the ring is
/// already off by then.
async fn open_led(
    config: &Config,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Option<Arc<dyn LedSink>>> {
    let led = led::open(&config.led)?;
    if config.led.boot_flash && !led::boot_flash(led.as_ref(), BOOT_FLASH_HOLD, shutdown).await {
        tracing::info!("shutdown requested during startup");
        return Ok(None);
    }
    Ok(Some(led))
}
