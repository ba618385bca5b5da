//! `stimtool set-mode` / `stimtool box-command`: the two ways the wire
//! protocol can change which mode is running (spec §6's current-mode
//! address and box-command register).

use stim_protocol::address::{ADDR_BOX_COMMAND, ADDR_CURRENT_MODE};
use stim_protocol::{mode_to_wire, BoxCommand};

use crate::client::DeviceClient;

#[derive(clap::Args, Debug)]
pub struct SetModeOpts {
    #[command(flatten)]
    port: crate::common::PortArgs,
    /// Internal mode index (0-24), not the wire-offset byte.
    mode: u8,
    #[arg(long, default_value_t = 0x42)]
    host_key: u8,
}

impl crate::ToolRun for SetModeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let mut client = DeviceClient::new(port);
        client.handshake()?;
        client.key_exchange(self.host_key)?;
        client.write(ADDR_CURRENT_MODE, &[mode_to_wire(self.mode)])?;
        println!("requested mode {} (applied at the device's next tick)", self.mode);
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct BoxCommandOpts {
    #[command(flatten)]
    port: crate::common::PortArgs,
    #[arg(value_enum)]
    command: BoxCommandArg,
    #[arg(long, default_value_t = 0x42)]
    host_key: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BoxCommandArg {
    Reload,
    Next,
    Prev,
    Refresh,
    PauseMute,
    SwapChannels,
    CopyAToB,
    CopyBToA,
    StartRamp,
}

impl From<BoxCommandArg> for BoxCommand {
    fn from(v: BoxCommandArg) -> Self {
        match v {
            BoxCommandArg::Reload => BoxCommand::ReloadMode,
            BoxCommandArg::Next => BoxCommand::NextMode,
            BoxCommandArg::Prev => BoxCommand::PrevMode,
            BoxCommandArg::Refresh => BoxCommand::RefreshMode,
            BoxCommandArg::PauseMute => BoxCommand::PauseMute,
            BoxCommandArg::SwapChannels => BoxCommand::SwapChannels,
            BoxCommandArg::CopyAToB => BoxCommand::CopyAToB,
            BoxCommandArg::CopyBToA => BoxCommand::CopyBToA,
            BoxCommandArg::StartRamp => BoxCommand::StartRamp,
        }
    }
}

impl crate::ToolRun for BoxCommandOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let mut client = DeviceClient::new(port);
        client.handshake()?;
        client.key_exchange(self.host_key)?;
        let cmd: BoxCommand = self.command.into();
        client.write(ADDR_BOX_COMMAND, &[cmd.to_byte()])?;
        println!("sent box command {:?}", self.command);
        Ok(())
    }
}
