use clap::{Parser, ValueEnum};
use persister::config::{
    AmqpConfig, ElasticsearchConfig, FilesystemConfig, MongoConfig, NatsConfig,
    PersisterConfig, QueueConfigType, StoreConfigType,
};
use persister::error::ConfigError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "persister")]
#[command(about = "Consumes crawled pages from a queue and writes them to storage")]
#[command(version)]
pub struct Args {
    /// JSON configuration file; when set, every other option is ignored
    #[arg(short, long, env = "PERSISTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Message broker to consume from
    #[arg(short, long, value_enum, default_value_t = QueueArg::Nats)]
    pub queue: QueueArg,

    /// Backing stores, written in the given order
    #[arg(
        short,
        long = "store",
        value_enum,
        env = "PERSISTER_STORES",
        value_delimiter = ',',
        default_values_t = [StoreArg::Mongo]
    )]
    pub stores: Vec<StoreArg>,

    #[arg(long, env = "NATS_URI")]
    pub nats_uri: Option<String>,

    #[arg(long, env = "AMQP_URI")]
    pub amqp_uri: Option<String>,

    /// Number of unacknowledged AMQP deliveries
    #[arg(long, env = "AMQP_PREFETCH", default_value_t = 1)]
    pub prefetch: u16,

    #[arg(long, env = "MONGO_URI")]
    pub mongo_uri: Option<String>,

    #[arg(long, default_value = "trandoshan")]
    pub mongo_database: String,

    #[arg(long, default_value = "resources")]
    pub mongo_collection: String,

    #[arg(long, env = "ELASTICSEARCH_URL", default_value = "http://localhost:9200")]
    pub elasticsearch_url: String,

    #[arg(long, default_value = "resources")]
    pub elasticsearch_index: String,

    /// Root directory of the filesystem store
    #[arg(long, env = "STORAGE_PATH")]
    pub storage_path: Option<String>,

    /// Number of NATS messages handled at the same time
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Timeout of a single store operation, in seconds
    #[arg(long, default_value_t = 5)]
    pub operation_timeout: u64,

    /// Seconds to wait before connecting
    #[arg(long, env = "STARTUP_DELAY", default_value_t = 0)]
    pub startup_delay: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum QueueArg {
    Nats,
    Amqp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Mongo,
    Elasticsearch,
    Filesystem,
    Memory,
}

impl Args {
    /// Build the persister configuration from the config file or the options
    pub fn into_config(self) -> Result<PersisterConfig, ConfigError> {
        if let Some(path) = &self.config {
            return PersisterConfig::from_file(path);
        }

        let queue = match self.queue {
            QueueArg::Nats => QueueConfigType::Nats(NatsConfig {
                uri: self.nats_uri.clone().ok_or(ConfigError::Missing("NATS_URI"))?,
                subject: persister::config::default_nats_subject(),
                queue_group: persister::config::default_nats_queue_group(),
                max_concurrency: self.concurrency,
            }),
            QueueArg::Amqp => QueueConfigType::Amqp(AmqpConfig {
                uri: self.amqp_uri.clone().ok_or(ConfigError::Missing("AMQP_URI"))?,
                queue: persister::config::default_amqp_queue(),
                prefetch: self.prefetch,
            }),
        };

        let mut stores = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            stores.push(self.store_config(*store)?);
        }

        let config = PersisterConfig {
            queue,
            stores,
            operation_timeout_secs: self.operation_timeout,
            startup_delay_secs: self.startup_delay,
        };
        config.validate()?;
        Ok(config)
    }

    fn store_config(&self, store: StoreArg) -> Result<StoreConfigType, ConfigError> {
        Ok(match store {
            StoreArg::Mongo => StoreConfigType::Mongo(MongoConfig {
                uri: self.mongo_uri.clone().ok_or(ConfigError::Missing("MONGO_URI"))?,
                database: self.mongo_database.clone(),
                collection: self.mongo_collection.clone(),
            }),
            StoreArg::Elasticsearch => StoreConfigType::Elasticsearch(ElasticsearchConfig {
                url: self.elasticsearch_url.clone(),
                index: self.elasticsearch_index.clone(),
            }),
            StoreArg::Filesystem => StoreConfigType::Filesystem(FilesystemConfig {
                root: self
                    .storage_path
                    .clone()
                    .ok_or(ConfigError::Missing("STORAGE_PATH"))?,
            }),
            StoreArg::Memory => StoreConfigType::Memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parse flags only, ignoring any `NATS_URI`, `STORAGE_PATH`, ... exported
    /// in the test environment
    fn parse(argv: &[&str]) -> Args {
        let matches = Args::command()
            .mut_args(|arg| arg.env(None::<&str>))
            .try_get_matches_from(argv.iter().copied())
            .unwrap();
        Args::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_nats_with_mongo() {
        let args = parse(&[
            "persister",
            "--nats-uri",
            "nats://nats:4222",
            "--mongo-uri",
            "mongodb://mongo:27017",
        ]);

        let config = args.into_config().unwrap();
        assert!(matches!(config.queue, QueueConfigType::Nats(ref n) if n.uri == "nats://nats:4222"));
        assert!(matches!(config.stores[..], [StoreConfigType::Mongo(_)]));
    }

    #[test]
    fn test_amqp_with_filesystem_and_elasticsearch() {
        let args = parse(&[
            "persister",
            "--queue",
            "amqp",
            "--amqp-uri",
            "amqp://rabbit:5672",
            "--prefetch",
            "20",
            "--store",
            "filesystem,elasticsearch",
            "--storage-path",
            "/data",
        ]);

        let config = args.into_config().unwrap();
        assert_eq!(config.max_concurrency(), 1);
        match &config.queue {
            QueueConfigType::Amqp(amqp) => assert_eq!(amqp.prefetch, 20),
            other => panic!("unexpected queue config {:?}", other),
        }
        assert!(matches!(
            config.stores[..],
            [StoreConfigType::Filesystem(_), StoreConfigType::Elasticsearch(_)]
        ));
    }

    #[test]
    fn test_missing_store_uri() {
        let args = parse(&[
            "persister",
            "--nats-uri",
            "nats://nats:4222",
            "--store",
            "filesystem",
        ]);

        let err = args.into_config().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STORAGE_PATH")));
    }

    #[test]
    fn test_missing_queue_uri() {
        let err = parse(&["persister", "--mongo-uri", "mongodb://mongo:27017"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("NATS_URI")));
    }
}
