use std::path::PathBuf;

use alloy_primitives::{Address, Bytes};
use clap::{Args, Parser, Subcommand};
use evm_lab::{parse_gas_price, parse_value, CallRequest, CreateRequest, LabConfig};

use super::{encode_call, encode_constructor_args, load_abi, GatewayClient};
use crate::{decode_hex, load_hex, Error, Result};

/// Gas limit of client requests when `--gas` is not given.
pub const DEFAULT_GAS: u64 = 10_000_000_000;

/// Client actions
#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Deploy a contract
    Deploy(DeployCmd),
    /// Call a contract
    Call(CallCmd),
}

impl Cmd {
    /// Builds the request, sends it to the gateway on the configured port and prints the
    /// response.
    pub async fn run(&self, config: LabConfig) -> Result<()> {
        let client = GatewayClient::local(config.port);
        let response = match self {
            Self::Deploy(cmd) => client.deploy(&cmd.request()?).await?,
            Self::Call(cmd) => client.call(&cmd.request()?).await?,
        };
        println!("output {}", serde_json::to_string(&response)?);
        Ok(())
    }
}

/// Fields shared by every request
#[derive(Args, Debug, Clone)]
pub struct TxArgs {
    /// Sender of the operation
    #[arg(long)]
    pub sender: Address,

    /// Gas limit
    #[arg(long, default_value_t = DEFAULT_GAS)]
    pub gas: u64,

    /// Gas price in wei
    #[arg(long = "gas-price", visible_aliases = ["gas_price"], default_value = "0")]
    pub gas_price: String,

    /// Value in wei
    #[arg(long, default_value = "0")]
    pub value: String,
}

impl TxArgs {
    /// Rejects malformed gas price and value before anything is sent.
    fn validate(&self) -> Result<()> {
        parse_gas_price(&self.gas_price)?;
        parse_value(&self.value)?;
        Ok(())
    }
}

/// Deploy a contract from its init code
#[derive(Parser, Debug)]
pub struct DeployCmd {
    /// Request fields
    #[command(flatten)]
    pub tx: TxArgs,

    /// Init code as hex
    #[arg(long, conflicts_with = "codefile")]
    pub code: Option<String>,

    /// File holding the init code as hex, `-` for stdin
    #[arg(long)]
    pub codefile: Option<PathBuf>,

    /// JSON ABI used to pack constructor arguments
    #[arg(long)]
    pub abi: Option<PathBuf>,

    /// Constructor arguments
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl DeployCmd {
    /// Builds the create request: init code followed by the packed constructor arguments.
    pub fn request(&self) -> Result<CreateRequest> {
        self.tx.validate()?;
        let code = load_hex(self.code.as_deref(), self.codefile.as_deref())?
            .ok_or_else(|| Error::InvalidInput("--code or --codefile is required".to_string()))?;

        let constructor_args = match &self.abi {
            Some(path) => encode_constructor_args(&load_abi(path)?, &self.args)?,
            None if self.args.is_empty() => Bytes::new(),
            None => {
                return Err(Error::InvalidInput(
                    "constructor arguments need --abi".to_string(),
                ))
            }
        };

        let mut code_and_input = code.to_vec();
        code_and_input.extend_from_slice(&constructor_args);

        Ok(CreateRequest {
            sender: self.tx.sender,
            code_and_input: code_and_input.into(),
            gas: self.tx.gas,
            gas_price: self.tx.gas_price.clone(),
            value: self.tx.value.clone(),
        })
    }
}

/// Call a deployed contract
#[derive(Parser, Debug)]
pub struct CallCmd {
    /// Request fields
    #[command(flatten)]
    pub tx: TxArgs,

    /// Called contract
    #[arg(long)]
    pub receiver: Address,

    /// Raw call data as hex
    #[arg(long, conflicts_with_all = ["abi", "method"])]
    pub input: Option<String>,

    /// JSON ABI of the contract
    #[arg(long, requires = "method")]
    pub abi: Option<PathBuf>,

    /// Method to call
    #[arg(long, requires = "abi")]
    pub method: Option<String>,

    /// Method arguments
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl CallCmd {
    /// Builds the call request from raw call data or from the ABI and method.
    pub fn request(&self) -> Result<CallRequest> {
        self.tx.validate()?;
        let input = match (&self.input, &self.abi, &self.method) {
            (Some(input), _, _) => decode_hex(input)?,
            (None, Some(abi), Some(method)) => encode_call(&load_abi(abi)?, method, &self.args)?,
            _ => Bytes::new(),
        };

        Ok(CallRequest {
            sender: self.tx.sender,
            receiver: self.receiver,
            input,
            gas: self.tx.gas,
            gas_price: self.tx.gas_price.clone(),
            value: self.tx.value.clone(),
        })
    }
}
