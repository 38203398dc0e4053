//! # Terminal Prompter
//!
//! Interactive answers read line by line. Secret key material is read
//! without echo when attached to a terminal.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::domain::{
    FundingPlan, ImportMode, KeySource, KnownAddress, Mutez, Network, PortPair, ProvisionError,
};
use crate::ports::{DirectoryChoice, Prompter};

/// Prompter reading answers from `R`, one per line.
pub struct TerminalPrompter<R> {
    lines: Mutex<Lines<R>>,
    hidden_secrets: bool,
}

impl TerminalPrompter<BufReader<Stdin>> {
    /// Prompter on the process's stdin.
    pub fn stdin() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            hidden_secrets: true,
        }
    }
}

impl<R> TerminalPrompter<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Prompter on an arbitrary reader. Secrets are read as plain lines.
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            hidden_secrets: false,
        }
    }

    async fn read_line(&self, prompt: &str) -> Result<String, ProvisionError> {
        print!("{}: ", prompt);
        std::io::stdout().flush()?;
        let line = self
            .lines
            .lock()
            .await
            .next_line()
            .await?
            .ok_or_else(|| ProvisionError::InvalidInput("input closed".to_string()))?;
        Ok(line.trim().to_string())
    }

    async fn ask(&self, prompt: &str, default: &str) -> Result<String, ProvisionError> {
        let answer = self.read_line(&format!("{} [{}]", prompt, default)).await?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    async fn ask_non_empty(&self, prompt: &str) -> Result<String, ProvisionError> {
        loop {
            let answer = self.read_line(prompt).await?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            println!("A value is required.");
        }
    }

    async fn ask_parsed<T: FromStr + ToString>(&self, prompt: &str, default: T) -> Result<T, ProvisionError> {
        let default = default.to_string();
        loop {
            let answer = self.ask(prompt, &default).await?;
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => println!("'{}' is not a valid number.", answer),
            }
        }
    }

    async fn ask_yes_no(&self, prompt: &str, default: bool) -> Result<bool, ProvisionError> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.read_line(&format!("{} [{}]", prompt, hint)).await?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    /// Returns the zero-based index of the chosen option.
    async fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize, ProvisionError> {
        println!("{}", prompt);
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
        loop {
            let answer = self.read_line("Choice").await?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => println!("Enter a number between 1 and {}.", options.len()),
            }
        }
    }

    async fn ask_secret(&self, prompt: &str) -> Result<String, ProvisionError> {
        if !self.hidden_secrets {
            return self.ask_non_empty(prompt).await;
        }
        loop {
            let prompt = format!("{}: ", prompt);
            let secret = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
                .await
                .map_err(|e| ProvisionError::InvalidInput(e.to_string()))??;
            let secret = secret.trim().to_string();
            if !secret.is_empty() {
                return Ok(secret);
            }
            println!("A value is required.");
        }
    }

    async fn ask_faucet_amount(&self, shortfall: Mutez) -> Result<Mutez, ProvisionError> {
        let default = shortfall.whole_tez() + u64::from(shortfall.as_mutez() % Mutez::PER_TEZ != 0);
        loop {
            let answer = self.ask("Amount to request (tez)", &default.to_string()).await?;
            match Mutez::parse_tez(&answer) {
                Ok(amount) if amount >= shortfall => return Ok(amount),
                Ok(_) => println!("The amount must be at least {}.", shortfall),
                Err(e) => println!("{}", e),
            }
        }
    }
}

#[async_trait]
impl<R> Prompter for TerminalPrompter<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn data_directory(&self, default: &DirectoryChoice) -> Result<DirectoryChoice, ProvisionError> {
        let name = self.ask("Data directory name", &default.name).await?;
        let parent = self
            .ask("Parent directory", &default.parent.display().to_string())
            .await?;
        Ok(DirectoryChoice {
            parent: PathBuf::from(parent),
            name,
        })
    }

    async fn confirm_delete(&self, path: &Path) -> Result<bool, ProvisionError> {
        self.ask_yes_no(
            &format!("{} already exists. Delete it and everything in it?", path.display()),
            false,
        )
        .await
    }

    async fn choose_another_directory(&self) -> Result<bool, ProvisionError> {
        self.ask_yes_no("Choose another directory? Answering no aborts", true)
            .await
    }

    async fn port_pair(&self, default: PortPair) -> Result<PortPair, ProvisionError> {
        let rpc_port = self.ask_parsed("RPC port", default.rpc_port).await?;
        let net_port = self.ask_parsed("P2P port", default.net_port).await?;
        Ok(PortPair::new(rpc_port, net_port))
    }

    async fn import_mode(&self) -> Result<ImportMode, ProvisionError> {
        let choice = self
            .choose(
                "Snapshot import mode:",
                &["fast (skip integrity checks)", "safe (verify integrity)"],
            )
            .await?;
        Ok(if choice == 0 {
            ImportMode::Fast
        } else {
            ImportMode::Safe
        })
    }

    async fn confirm_service_setup(&self, service_name: &str) -> Result<bool, ProvisionError> {
        self.ask_yes_no(
            &format!("Run the node as background service '{}'?", service_name),
            true,
        )
        .await
    }

    async fn confirm_baker_setup(&self) -> Result<bool, ProvisionError> {
        self.ask_yes_no("Set up a baker for this node?", true).await
    }

    async fn key_source(&self, known: &[KnownAddress]) -> Result<KeySource, ProvisionError> {
        let mut options = Vec::new();
        if !known.is_empty() {
            println!("Known addresses:");
            for k in known {
                println!("  {}: {}", k.alias, k.address);
            }
            options.push("Use an existing key");
        }
        options.extend(["Generate a new key", "Import from a Ledger", "Import a secret key"]);

        let mut choice = self.choose("Baking key:", &options).await?;
        if known.is_empty() {
            choice += 1;
        }

        match choice {
            0 => loop {
                let alias = self.ask_non_empty("Alias of the existing key").await?;
                if known.iter().any(|k| k.alias == alias) {
                    return Ok(KeySource::Existing { alias });
                }
                println!("No known key named '{}'.", alias);
            },
            1 => Ok(KeySource::Generate {
                alias: self.ask_non_empty("Alias for the new key").await?,
            }),
            2 => Ok(KeySource::Ledger {
                alias: self.ask_non_empty("Alias for the Ledger key").await?,
                device_path: self
                    .ask_non_empty("Ledger path (ledger://<animals>/<curve>/<path>)")
                    .await?,
            }),
            _ => Ok(KeySource::SecretKey {
                alias: self.ask_non_empty("Alias for the imported key").await?,
                secret: self.ask_secret("Secret key (edsk...)").await?,
            }),
        }
    }

    async fn funding_plan(
        &self,
        network: Network,
        address: &str,
        shortfall: Mutez,
    ) -> Result<FundingPlan, ProvisionError> {
        println!("The baker needs {} more at {}.", shortfall, address);
        if !network.has_faucet() {
            println!("Send the funds to that address; the balance will be checked periodically.");
            return Ok(FundingPlan::SelfFund);
        }

        let choice = self
            .choose(
                "Funding:",
                &["I will send the funds myself", "Request funds from the faucet"],
            )
            .await?;
        if choice == 0 {
            return Ok(FundingPlan::SelfFund);
        }
        Ok(FundingPlan::Faucet {
            amount: self.ask_faucet_amount(shortfall).await?,
        })
    }

    async fn retry_registration(&self, error: &ProvisionError) -> Result<bool, ProvisionError> {
        println!("{}", error);
        self.ask_yes_no("Wait for more funds and retry the registration?", true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &'static str) -> TerminalPrompter<&'static [u8]> {
        TerminalPrompter::from_reader(input.as_bytes())
    }

    #[tokio::test]
    async fn test_defaults_on_empty_answers() {
        let p = prompter("\n\n\n\n");
        let default = DirectoryChoice {
            parent: PathBuf::from("/srv"),
            name: "octez-node-ghostnet".to_string(),
        };

        assert_eq!(p.data_directory(&default).await.unwrap(), default);
        assert_eq!(
            p.port_pair(PortPair::new(8732, 9732)).await.unwrap(),
            PortPair::new(8732, 9732)
        );
    }

    #[tokio::test]
    async fn test_invalid_port_is_asked_again() {
        let p = prompter("abc\n70000\n8733\n9733\n");
        assert_eq!(
            p.port_pair(PortPair::new(8732, 9732)).await.unwrap(),
            PortPair::new(8733, 9733)
        );
    }

    #[tokio::test]
    async fn test_yes_no_default_and_retry() {
        let p = prompter("\nmaybe\nY\n");
        assert!(!p.confirm_delete(Path::new("/srv/x")).await.unwrap());
        assert!(p.confirm_delete(Path::new("/srv/x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_key_source_without_known_keys_shifts_choices() {
        let p = prompter("3\nhot\nedsk123\n");
        let source = p.key_source(&[]).await.unwrap();
        assert_eq!(
            source,
            KeySource::SecretKey {
                alias: "hot".to_string(),
                secret: "edsk123".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_existing_key_must_be_known() {
        let p = prompter("1\nnope\nbaker\n");
        let known = [KnownAddress {
            alias: "baker".to_string(),
            address: "tz1abc".to_string(),
        }];
        assert_eq!(
            p.key_source(&known).await.unwrap(),
            KeySource::Existing {
                alias: "baker".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_faucet_amount_below_shortfall_is_rejected() {
        let p = prompter("2\n100\n6000\n");
        let plan = p
            .funding_plan(Network::Ghostnet, "tz1abc", Mutez::from_tez(6000))
            .await
            .unwrap();
        assert_eq!(
            plan,
            FundingPlan::Faucet {
                amount: Mutez::from_tez(6000)
            }
        );
    }

    #[tokio::test]
    async fn test_mainnet_funding_is_self_fund() {
        let p = prompter("");
        let plan = p
            .funding_plan(Network::Mainnet, "tz1abc", Mutez::from_tez(10))
            .await
            .unwrap();
        assert_eq!(plan, FundingPlan::SelfFund);
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let p = prompter("");
        assert!(matches!(
            p.confirm_baker_setup().await,
            Err(ProvisionError::InvalidInput(_))
        ));
    }
}
