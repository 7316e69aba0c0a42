//! Routing named signals through the fixture's analog multiplexers.
//!
//! Each mux bank picks one signal onto a shared line (a scope channel, or
//! the logic fixture's muxed analog output) using address pins on the
//! digital output port. Selecting a signal rewrites only its own bank's
//! pins, and the routing holds until the next selection.

use tracing::debug;

use crate::daq::DigitalOut;
use crate::error::{BenchError, Result};
use crate::register::DigitalOutputRegister;

/// One mux and the port pins that address it.
#[derive(Debug, Clone, Copy)]
pub struct MuxBank {
    pub name: &'static str,
    /// Address pins, least significant first.
    pub address_pins: &'static [&'static str],
    pub signals: &'static [(&'static str, u8)],
}

impl MuxBank {
    pub fn address_of(&self, signal: &str) -> Option<u8> {
        self.signals
            .iter()
            .find(|(name, _)| *name == signal)
            .map(|(_, addr)| *addr)
    }

    /// Number of distinct addresses the pins can select.
    pub fn capacity(&self) -> u16 {
        1 << self.address_pins.len()
    }
}

/// A signal resolved to its bank and address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxSelection {
    pub bank: &'static str,
    pub address: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct MuxedOutputSelector {
    // Searched front to back; the first bank listing a signal wins.
    banks: &'static [MuxBank],
}

impl MuxedOutputSelector {
    pub const fn new(banks: &'static [MuxBank]) -> Self {
        Self { banks }
    }

    pub fn banks(&self) -> &'static [MuxBank] {
        self.banks
    }

    /// Finds the bank routing `signal`.
    ///
    /// Fails with `MuxAddress` when the table gives an address the bank's
    /// pins cannot reach.
    pub fn resolve(&self, signal: &str) -> Result<(&'static MuxBank, MuxSelection)> {
        let (bank, address) = self
            .banks
            .iter()
            .find_map(|bank| bank.address_of(signal).map(|address| (bank, address)))
            .ok_or_else(|| BenchError::UnknownSignal(signal.to_string()))?;
        if u16::from(address) >= bank.capacity() {
            return Err(BenchError::MuxAddress {
                bank: bank.name,
                signal: signal.to_string(),
                address,
            });
        }
        Ok((
            bank,
            MuxSelection {
                bank: bank.name,
                address,
            },
        ))
    }

    /// Routes `signal` by driving its bank's address pins, A0 first.
    pub fn select<D: DigitalOut>(
        &self,
        register: &mut DigitalOutputRegister<D>,
        signal: &str,
    ) -> Result<MuxSelection> {
        let (bank, selection) = self.resolve(signal)?;
        for (bit, pin) in bank.address_pins.iter().enumerate() {
            register.drive_pin(pin, selection.address & (1u8 << bit) != 0)?;
        }
        debug!(signal, bank = bank.name, address = selection.address, "mux selected");
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daq::SimulatedDaq;
    use crate::fixture::{LOGIC_MUX_BANKS, LOGIC_PINS, POWER_MUX_BANKS, POWER_PINS};

    const CH1_MASK: u16 = 0x0010 | 0x0020;
    const CH2_MASK: u16 = 0x0040 | 0x0100;

    fn register() -> DigitalOutputRegister<SimulatedDaq> {
        DigitalOutputRegister::new(SimulatedDaq::new(), 0x201, POWER_PINS).unwrap()
    }

    #[test]
    fn resolves_in_bank_priority_order() {
        let selector = MuxedOutputSelector::new(POWER_MUX_BANKS);
        let (_, sel) = selector.resolve("CONTACTOR_EN").unwrap();
        assert_eq!(sel, MuxSelection { bank: "CH1", address: 2 });
        let (bank, sel) = selector.resolve("PWR_EN").unwrap();
        assert_eq!(bank.address_pins, &["CH2_A0", "CH2_A1"]);
        assert_eq!(sel.address, 2);
    }

    #[test]
    fn reselect_overwrites_only_own_bank() {
        let selector = MuxedOutputSelector::new(POWER_MUX_BANKS);
        let mut reg = register();
        reg.set_pin("MOTOREN").unwrap();
        selector.select(&mut reg, "VSYS").unwrap();
        assert_eq!(reg.word() & CH1_MASK, CH1_MASK);

        selector.select(&mut reg, "VCAP").unwrap();
        assert_eq!(reg.word() & CH2_MASK, 0);

        selector.select(&mut reg, "ESCON_PWM").unwrap();
        // address 1: A0 high, A1 low
        assert_eq!(reg.word() & CH2_MASK, 0x0040);
        // bank 1 and unrelated pins are untouched
        assert_eq!(reg.word() & CH1_MASK, CH1_MASK);
        assert!(reg.is_set("MOTOREN").unwrap());
    }

    #[test]
    fn every_signal_lands_on_its_address() {
        let selector = MuxedOutputSelector::new(POWER_MUX_BANKS);
        let mut reg = register();
        for bank in selector.banks() {
            for (signal, address) in bank.signals {
                selector.select(&mut reg, signal).unwrap();
                for (bit, pin) in bank.address_pins.iter().enumerate() {
                    let high = *address & (1u8 << bit) != 0;
                    assert_eq!(reg.is_set(pin).unwrap(), high, "{}", signal);
                }
            }
        }
    }

    #[test]
    fn unknown_signal_writes_nothing() {
        let selector = MuxedOutputSelector::new(POWER_MUX_BANKS);
        let mut reg = register();
        let writes = reg.port().digital_writes.len();
        assert!(matches!(
            selector.select(&mut reg, "VCAP_DIV"),
            Err(BenchError::UnknownSignal(s)) if s == "VCAP_DIV"
        ));
        assert_eq!(reg.port().digital_writes.len(), writes);
        assert_eq!(reg.word(), 0);
    }

    #[test]
    fn three_pin_bank_drives_high_address_bits() {
        let selector = MuxedOutputSelector::new(LOGIC_MUX_BANKS);
        let mut reg = DigitalOutputRegister::new(SimulatedDaq::new(), 0x201, LOGIC_PINS).unwrap();
        reg.set_pin("NTC_EN").unwrap();

        // VMOTOR_DIV is address 5: A0 and A2 high
        selector.select(&mut reg, "VMOTOR_DIV").unwrap();
        assert_eq!(reg.word() & 0xE000, 0xA000);

        // IMICRO is address 3: A0 and A1 high, A2 cleared again
        let sel = selector.select(&mut reg, "IMICRO").unwrap();
        assert_eq!(sel, MuxSelection { bank: "VOUT", address: 3 });
        assert_eq!(reg.word() & 0xE000, 0x6000);
        assert!(reg.is_set("NTC_EN").unwrap());
    }

    #[test]
    fn address_beyond_bank_pins_is_rejected() {
        static NARROW: &[MuxBank] = &[MuxBank {
            name: "CH1",
            address_pins: &["CH1_A0", "CH1_A1"],
            signals: &[("VMOTOR", 0), ("WIDE", 4)],
        }];
        let selector = MuxedOutputSelector::new(NARROW);
        let mut reg = register();
        let writes = reg.port().digital_writes.len();
        assert!(matches!(
            selector.select(&mut reg, "WIDE"),
            Err(BenchError::MuxAddress { bank: "CH1", address: 4, .. })
        ));
        assert_eq!(reg.port().digital_writes.len(), writes);
        assert_eq!(reg.word(), 0);
    }
}
