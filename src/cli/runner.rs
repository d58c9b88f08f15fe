//! Command runner: builds the client from arguments and prints manifests

use crate::cli::args::Args;
use crate::cli::config::{parse_credential_flag, parse_registry_flag};
use crate::config::{BatchOptions, ClientConfig};
use crate::error::handlers::ValidationErrorHandler;
use crate::error::Result;
use crate::image::{ImageSpec, parse_image_list};
use crate::logging::Logger;
use crate::registry::credentials::Credential;
use crate::registry::directory::{DOCKER_HUB_KEY, GHCR_KEY, RegistryDirectory};
use crate::registry::manifest::ManifestResult;
use crate::registry::resolver::RegistryTarget;
use crate::registry::RegistryClient;
use std::collections::{BTreeMap, HashMap};

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    /// Run the command; returns how many images failed
    pub async fn run(&self) -> Result<usize> {
        self.args.validate()?;

        let specs = parse_image_list(&self.args.image, &self.args.tag)?;
        let client = self.create_client()?;

        if self.args.estimate {
            self.print_estimates(&client, &specs)?;
            return Ok(0);
        }

        match specs.as_slice() {
            [spec] => {
                self.fetch_single(&client, spec).await?;
                Ok(0)
            }
            _ => Ok(self.fetch_batch(&client, &specs).await),
        }
    }

    fn create_client(&self) -> Result<RegistryClient> {
        let config = ClientConfig::default()
            .with_timeout(self.args.timeout)
            .with_proxy(self.args.proxy.clone())
            .with_skip_tls(self.args.skip_tls);

        let directory = RegistryDirectory::global();
        for value in &self.args.registries {
            let (key, endpoint) = parse_registry_flag(value)?;
            self.output.verbose(&format!(
                "Registering registry '{}' at {}",
                key, endpoint.registry_url
            ));
            directory.register(&key, endpoint)?;
        }

        RegistryClient::builder()
            .with_config(config)
            .with_directory(directory)
            .with_credentials(self.collect_credentials()?)
            .with_logger(self.output.clone())
            .build()
    }

    fn collect_credentials(&self) -> Result<HashMap<String, Credential>> {
        let mut credentials = HashMap::new();

        let pairs = [
            (
                DOCKER_HUB_KEY,
                "Docker Hub",
                &self.args.dockerhub_username,
                &self.args.dockerhub_token,
            ),
            (
                GHCR_KEY,
                "GitHub Container Registry",
                &self.args.ghcr_username,
                &self.args.ghcr_token,
            ),
        ];

        for (key, name, username, token) in pairs {
            ValidationErrorHandler::validate_credentials(name, username, token)?;
            if let (Some(username), Some(token)) = (username, token) {
                credentials.insert(key.to_string(), Credential::new(username, token));
                self.output
                    .status(&format!("Configured {} credentials", name));
            }
        }

        for value in &self.args.credentials {
            match parse_credential_flag(value) {
                Ok((key, credential)) => {
                    self.output
                        .status(&format!("Configured {} credentials", key));
                    credentials.insert(key, credential);
                }
                Err(e) => self.output.warning(&format!("Skipping credentials: {}", e)),
            }
        }

        Ok(credentials)
    }

    async fn fetch_single(&self, client: &RegistryClient, spec: &ImageSpec) -> Result<()> {
        self.output.verbose(&format!("Fetching manifest for {}", spec));

        let fetched = client.get_manifest_with_digest(&spec.image, &spec.tag).await?;

        if self.args.digest && !fetched.digest.is_empty() {
            self.output.status(&format!("Digest: {}\n", fetched.digest));
        }
        self.print_manifest(&fetched.manifest);
        Ok(())
    }

    async fn fetch_batch(&self, client: &RegistryClient, specs: &[ImageSpec]) -> usize {
        self.output.status(&format!(
            "Fetching manifests for {} images...",
            specs.len()
        ));

        let options = BatchOptions::default()
            .with_concurrency(self.args.concurrency)
            .with_batch_auth(!self.args.no_batch_auth)
            .with_max_group_size(self.args.batch_size);

        let results = client.get_manifests_with_digest(specs, &options).await;
        let failed = self.report_results(&results);

        self.output.summary_kv(
            "Summary",
            &[
                ("Images", results.len().to_string()),
                ("Succeeded", (results.len() - failed).to_string()),
                ("Failed", failed.to_string()),
                ("Elapsed", self.output.format_duration(self.output.elapsed())),
            ],
        );

        failed
    }

    fn report_results(&self, results: &[ManifestResult]) -> usize {
        let mut failed = 0;

        for (i, result) in results.iter().enumerate() {
            self.output.section(&format!(
                "[{}/{}] {}:{}",
                i + 1,
                results.len(),
                result.image,
                result.tag
            ));

            match &result.result {
                Ok(fetched) => {
                    if self.args.digest && !fetched.digest.is_empty() {
                        self.output.status(&format!("OK Digest: {}", fetched.digest));
                    } else {
                        self.output.status("OK");
                    }
                    self.print_manifest(&fetched.manifest);
                    if i + 1 < results.len() {
                        println!();
                    }
                }
                Err(e) => {
                    failed += 1;
                    self.output.status(&format!("FAILED: {}", e));
                }
            }
        }

        failed
    }

    fn print_estimates(&self, client: &RegistryClient, specs: &[ImageSpec]) -> Result<()> {
        let mut samples: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for spec in specs {
            match client.resolve(&spec.image) {
                RegistryTarget::Registered(key) => {
                    samples.entry(key).or_default().push(spec.image.as_str())
                }
                RegistryTarget::Unregistered { domain } => self.output.warning(&format!(
                    "{} is not a registered registry; no batch estimate for {}",
                    domain, spec.image
                )),
            }
        }

        for (key, images) in &samples {
            let estimate = client.estimate_max_images_for_batch(images.as_slice(), key)?;
            println!("{}: {} images per batch token", key, estimate);
        }
        Ok(())
    }

    fn print_manifest(&self, manifest: &str) {
        if !self.args.pretty {
            println!("{}", manifest);
            return;
        }

        match pretty_json(manifest) {
            Some(pretty) => println!("{}", pretty),
            None => {
                self.output
                    .warning("Manifest is not valid JSON, printing raw body");
                println!("{}", manifest);
            }
        }
    }
}

fn pretty_json(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
