use midir::{MidiIO, MidiInput, MidiOutput, MidiOutputConnection};
use traffic_jam_core::{ControlId, MidiMessage, Result, Surface, SurfaceLayout, TrafficJamError};

const CLIENT_NAME: &str = "traffic-jam";

/// Surface backed by two MIDI connections: LED feedback goes back to the
/// controller, translated messages go out on the relay port.
pub struct MidiSurface {
    device: MidiOutputConnection,
    relay: MidiOutputConnection,
    layout: SurfaceLayout,
}

impl MidiSurface {
    pub fn open(device_filter: &str, relay_name: &str, layout: SurfaceLayout) -> Result<Self> {
        let output = new_output()?;
        let port = find_port(&output, device_filter)?;
        let device = output
            .connect(&port, "traffic-jam-device")
            .map_err(|err| {
                TrafficJamError::msg(format!("failed to connect to `{device_filter}`: {err}"))
            })?;
        let relay = open_relay(relay_name)?;

        Ok(Self {
            device,
            relay,
            layout,
        })
    }
}

impl Surface for MidiSurface {
    fn send_midi(&mut self, message: MidiMessage) {
        if let Err(err) = self.relay.send(&message.to_bytes()) {
            tracing::warn!(%err, ?message, "relay send failed");
        }
    }

    fn set_color(&mut self, control: ControlId, color: u8) {
        let Some(message) = self.layout.color_message(control, color) else {
            return;
        };
        if let Err(err) = self.device.send(&message.to_bytes()) {
            tracing::warn!(%err, %control, "LED update failed");
        }
    }

    fn set_strip(&mut self, control: ControlId, position: u8) {
        let Some(message) = self.layout.strip_message(control, position) else {
            return;
        };
        if let Err(err) = self.device.send(&message.to_bytes()) {
            tracing::warn!(%err, %control, "strip update failed");
        }
    }
}

pub fn new_input() -> Result<MidiInput> {
    MidiInput::new(CLIENT_NAME)
        .map_err(|err| TrafficJamError::msg(format!("MIDI input unavailable: {err}")))
}

pub fn new_output() -> Result<MidiOutput> {
    MidiOutput::new(CLIENT_NAME)
        .map_err(|err| TrafficJamError::msg(format!("MIDI output unavailable: {err}")))
}

/// First port whose name contains `filter`.
pub fn find_port<T: MidiIO>(io: &T, filter: &str) -> Result<T::Port> {
    io.ports()
        .into_iter()
        .find(|port| {
            io.port_name(port)
                .map(|name| name.contains(filter))
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            TrafficJamError::msg(format!(
                "no MIDI port matching `{filter}`, is the controller plugged in?"
            ))
        })
}

/// Names of every port `io` can see.
pub fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

#[cfg(unix)]
fn open_relay(name: &str) -> Result<MidiOutputConnection> {
    use midir::os::unix::VirtualOutput;

    new_output()?
        .create_virtual(name)
        .map_err(|err| {
            TrafficJamError::msg(format!("failed to create relay port `{name}`: {err}"))
        })
}

#[cfg(not(unix))]
fn open_relay(name: &str) -> Result<MidiOutputConnection> {
    let output = new_output()?;
    let port = find_port(&output, name)?;
    output
        .connect(&port, name)
        .map_err(|err| {
            TrafficJamError::msg(format!("failed to connect relay port `{name}`: {err}"))
        })
}
