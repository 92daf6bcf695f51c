//! SSD1306 OLED driver: bring-up, command/data byte protocol, DMA page writes.
//!
//! The panel sits on a synchronous serial bus with three control lines:
//! mode-select (command/data), device-select and reset. The driver is generic
//! over [`DisplayInterface`] so the wire protocol can be exercised on the
//! host with a recording mock; the binary provides the embassy-rp
//! implementation (blocking SPI for single bytes, DMA for page streams).
//!
//! # Protocol rules
//!
//! - The mode line is set *before* device-select is asserted.
//! - Device-select is held active for a guard interval before and after each
//!   byte, and fully deasserts between logically distinct bytes. Only a bulk
//!   page transfer keeps it asserted across multiple bytes.
//! - Every command byte is followed by a minimum settle time.
//! - At most one bulk transfer is outstanding at a time; the display task is
//!   the sole caller.

/// Minimum hold time for each phase of the reset pulse, in microseconds.
const RESET_LATENCY_US: u32 = 10;

/// Device-select setup/hold guard around a transfer, in microseconds.
const SELECT_GUARD_US: u32 = 1;

/// Settle time after each command or data byte, in microseconds.
const COMMAND_SETTLE_US: u32 = 4;

// SSD1306 command set
const SET_MULTIPLEX_RATIO: u8 = 0xA8;
const SET_DISPLAY_OFFSET: u8 = 0xD3;
const SET_START_LINE: u8 = 0x40; // OR'd with a 6-bit line number
const SET_MEMORY_MODE: u8 = 0x20;
const SEGMENT_REMAP_REVERSE: u8 = 0xA1; // column 127 mapped to SEG0
const COM_SCAN_DECREMENT: u8 = 0xC8;
const SET_COM_PINS: u8 = 0xDA;
const SET_CONTRAST: u8 = 0x81;
const ENTIRE_DISPLAY_ON: u8 = 0xA5;
const ENTIRE_DISPLAY_RESUME: u8 = 0xA4;
const NORMAL_DISPLAY: u8 = 0xA6;
const INVERT_DISPLAY: u8 = 0xA7;
const SET_CLOCK_DIVIDE: u8 = 0xD5;
const SET_CHARGE_PUMP: u8 = 0x8D;
const SET_VCOMH_DESELECT: u8 = 0xDB;
const SET_PRECHARGE_PERIOD: u8 = 0xD9;
const DISPLAY_ON: u8 = 0xAF;
const DISPLAY_OFF: u8 = 0xAE;
const PAGE_START: u8 = 0xB0; // OR'd with a 4-bit page number
const COLUMN_LOW_NIBBLE: u8 = 0x00;
const COLUMN_HIGH_NIBBLE: u8 = 0x10;

/// Interpretation of the next bytes on the bus, driven on the mode line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Command,
    Data,
}

/// Errors from the display wire protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayError {
    /// The underlying bus rejected a transfer.
    Bus,
    /// A bulk transfer did not complete within its bounded wait. The
    /// device-select line has been released; the panel may need re-init.
    TransferTimeout,
}

/// Hardware access needed by the driver: one write-only bus, three control
/// lines and a calibrated delay.
///
/// `write_blocking` is the per-byte path; `write_bulk` is expected to stream
/// the whole buffer without per-byte CPU intervention (DMA on the real bus)
/// and to resolve only once the transfer-complete condition is observed, or
/// fail with [`DisplayError::TransferTimeout`] after a bounded wait.
#[allow(async_fn_in_trait)]
pub trait DisplayInterface {
    /// Drive the mode-select line.
    fn set_mode(&mut self, mode: Mode);

    /// Drive the device-select line (`true` = selected/active).
    fn set_select(&mut self, selected: bool);

    /// Drive the reset line (`true` = reset asserted/active).
    fn set_reset(&mut self, active: bool);

    /// Clock out bytes, returning once they are on the wire.
    fn write_blocking(&mut self, bytes: &[u8]) -> Result<(), DisplayError>;

    /// Stream a buffer via DMA, resolving on transfer-complete.
    async fn write_bulk(&mut self, bytes: &[u8]) -> Result<(), DisplayError>;

    /// Wait at least `us` microseconds.
    async fn delay_us(&mut self, us: u32);
}

/// SSD1306 driver for the 128x32 panel.
pub struct Ssd1306<I: DisplayInterface> {
    iface: I,
}

impl<I: DisplayInterface> Ssd1306<I> {
    pub fn new(iface: I) -> Self {
        Self { iface }
    }

    /// Bring the panel up from power-on to "display on".
    ///
    /// The command order is fixed by the device; do not reorder. Operand
    /// values are for the 128x32 variant (1/32 duty, COM pins 0x02,
    /// charge pump enabled).
    pub async fn init(&mut self) -> Result<(), DisplayError> {
        self.hard_reset().await;

        // 1/32 duty for the 32-row panel
        self.write_command(SET_MULTIPLEX_RATIO).await?;
        self.write_command(0x1F).await?;

        self.write_command(SET_DISPLAY_OFFSET).await?;
        self.write_command(0x00).await?;

        self.set_display_start_line(0).await?;

        self.write_command(SET_MEMORY_MODE).await?;
        self.write_command(0x00).await?;

        // Flip segment and COM order so (0, 0) is the top-left corner
        self.write_command(SEGMENT_REMAP_REVERSE).await?;
        self.write_command(COM_SCAN_DECREMENT).await?;

        self.write_command(SET_COM_PINS).await?;
        self.write_command(0x02).await?;

        self.set_contrast(0x8F).await?;

        // Entire-display-on override, then back to following RAM contents
        self.write_command(ENTIRE_DISPLAY_ON).await?;
        self.write_command(ENTIRE_DISPLAY_RESUME).await?;

        self.set_invert(false).await?;

        self.write_command(SET_CLOCK_DIVIDE).await?;
        self.write_command(0x80).await?;

        self.write_command(SET_CHARGE_PUMP).await?;
        self.write_command(0x14).await?;

        self.write_command(SET_VCOMH_DESELECT).await?;
        self.write_command(0x40).await?;

        // Pre-charge 15 clocks, discharge 1 clock
        self.write_command(SET_PRECHARGE_PERIOD).await?;
        self.write_command(0xF1).await?;

        self.display_on().await
    }

    /// Pulse the reset line: inactive, active, inactive, each phase held
    /// for at least the device's minimum latency.
    async fn hard_reset(&mut self) {
        self.iface.set_reset(false);
        self.iface.delay_us(RESET_LATENCY_US).await;
        self.iface.set_reset(true);
        self.iface.delay_us(RESET_LATENCY_US).await;
        self.iface.set_reset(false);
        self.iface.delay_us(RESET_LATENCY_US).await;
    }

    /// Send one byte with full select discipline: mode line first, select
    /// with guard holds around the transfer, deselect, settle.
    async fn write_byte(&mut self, mode: Mode, byte: u8) -> Result<(), DisplayError> {
        self.iface.set_mode(mode);
        self.iface.set_select(true);
        self.iface.delay_us(SELECT_GUARD_US).await;
        let result = self.iface.write_blocking(&[byte]);
        self.iface.delay_us(SELECT_GUARD_US).await;
        self.iface.set_select(false);
        self.iface.delay_us(COMMAND_SETTLE_US).await;
        result
    }

    /// Send a single command byte.
    pub async fn write_command(&mut self, command: u8) -> Result<(), DisplayError> {
        self.write_byte(Mode::Command, command).await
    }

    /// Send a single data byte (one column of the current page).
    pub async fn write_data(&mut self, data: u8) -> Result<(), DisplayError> {
        self.write_byte(Mode::Data, data).await
    }

    /// Set the page register (4-bit address).
    pub async fn set_page_address(&mut self, page: u8) -> Result<(), DisplayError> {
        self.write_command(PAGE_START | (page & 0x0F)).await
    }

    /// Set the column register (7-bit address, high nibble then low).
    pub async fn set_column_address(&mut self, column: u8) -> Result<(), DisplayError> {
        let column = column & 0x7F;
        self.write_command(COLUMN_HIGH_NIBBLE | (column >> 4)).await?;
        self.write_command(COLUMN_LOW_NIBBLE | (column & 0x0F)).await
    }

    /// Set the RAM display start line (6-bit address).
    pub async fn set_display_start_line(&mut self, line: u8) -> Result<(), DisplayError> {
        self.write_command(SET_START_LINE | (line & 0x3F)).await
    }

    pub async fn set_contrast(&mut self, contrast: u8) -> Result<(), DisplayError> {
        self.write_command(SET_CONTRAST).await?;
        self.write_command(contrast).await
    }

    pub async fn set_invert(&mut self, inverted: bool) -> Result<(), DisplayError> {
        let command = if inverted { INVERT_DISPLAY } else { NORMAL_DISPLAY };
        self.write_command(command).await
    }

    pub async fn display_on(&mut self) -> Result<(), DisplayError> {
        self.write_command(DISPLAY_ON).await
    }

    pub async fn display_off(&mut self) -> Result<(), DisplayError> {
        self.write_command(DISPLAY_OFF).await
    }

    /// Stream one page of column bytes starting at `column` via a single
    /// bulk transfer.
    ///
    /// An empty buffer is a no-op: the call returns immediately without
    /// touching any bus line. On a transfer timeout the select line is
    /// still released before the error is returned.
    pub async fn write_page(
        &mut self,
        page: u8,
        column: u8,
        data: &[u8],
    ) -> Result<(), DisplayError> {
        if data.is_empty() {
            return Ok(());
        }

        self.set_page_address(page).await?;
        self.set_column_address(column).await?;

        self.iface.set_mode(Mode::Data);
        self.iface.set_select(true);
        self.iface.delay_us(SELECT_GUARD_US).await;
        let result = self.iface.write_bulk(data).await;
        self.iface.delay_us(SELECT_GUARD_US).await;
        self.iface.set_select(false);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    /// Everything the driver does to the interface, in order.
    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Mode(Mode),
        Select(bool),
        Reset(bool),
        Write(Vec<u8>),
        Bulk(Vec<u8>),
        DelayUs(u32),
    }

    #[derive(Default)]
    struct MockInterface {
        ops: Vec<Op>,
        fail_bulk: bool,
    }

    impl DisplayInterface for MockInterface {
        fn set_mode(&mut self, mode: Mode) {
            self.ops.push(Op::Mode(mode));
        }

        fn set_select(&mut self, selected: bool) {
            self.ops.push(Op::Select(selected));
        }

        fn set_reset(&mut self, active: bool) {
            self.ops.push(Op::Reset(active));
        }

        fn write_blocking(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
            self.ops.push(Op::Write(bytes.to_vec()));
            Ok(())
        }

        async fn write_bulk(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
            self.ops.push(Op::Bulk(bytes.to_vec()));
            if self.fail_bulk {
                Err(DisplayError::TransferTimeout)
            } else {
                Ok(())
            }
        }

        async fn delay_us(&mut self, us: u32) {
            self.ops.push(Op::DelayUs(us));
        }
    }

    fn driver() -> Ssd1306<MockInterface> {
        Ssd1306::new(MockInterface::default())
    }

    /// Bytes written while the mode line was in the given state.
    fn bytes_in_mode(ops: &[Op], wanted: Mode) -> Vec<u8> {
        let mut mode = None;
        let mut out = Vec::new();
        for op in ops {
            match op {
                Op::Mode(m) => mode = Some(*m),
                Op::Write(bytes) | Op::Bulk(bytes) if mode == Some(wanted) => {
                    out.extend_from_slice(bytes);
                }
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_init_command_sequence() {
        let mut d = driver();
        block_on(d.init()).unwrap();
        let expected: Vec<u8> = vec![
            SET_MULTIPLEX_RATIO, 0x1F,
            SET_DISPLAY_OFFSET, 0x00,
            SET_START_LINE,
            SET_MEMORY_MODE, 0x00,
            SEGMENT_REMAP_REVERSE,
            COM_SCAN_DECREMENT,
            SET_COM_PINS, 0x02,
            SET_CONTRAST, 0x8F,
            ENTIRE_DISPLAY_ON, ENTIRE_DISPLAY_RESUME,
            NORMAL_DISPLAY,
            SET_CLOCK_DIVIDE, 0x80,
            SET_CHARGE_PUMP, 0x14,
            SET_VCOMH_DESELECT, 0x40,
            SET_PRECHARGE_PERIOD, 0xF1,
            DISPLAY_ON,
        ];
        assert_eq!(bytes_in_mode(&d.iface.ops, Mode::Command), expected);
        assert!(bytes_in_mode(&d.iface.ops, Mode::Data).is_empty());
    }

    #[test]
    fn test_reset_pulse_precedes_commands() {
        let mut d = driver();
        block_on(d.init()).unwrap();
        // Inactive, active, inactive, each held for the device latency,
        // before anything else happens on the bus.
        assert_eq!(
            &d.iface.ops[..6],
            &[
                Op::Reset(false),
                Op::DelayUs(RESET_LATENCY_US),
                Op::Reset(true),
                Op::DelayUs(RESET_LATENCY_US),
                Op::Reset(false),
                Op::DelayUs(RESET_LATENCY_US),
            ]
        );
    }

    #[test]
    fn test_mode_set_before_select() {
        let mut d = driver();
        block_on(d.write_command(0xA4)).unwrap();
        block_on(d.write_data(0x55)).unwrap();
        let ops = &d.iface.ops;
        for (i, op) in ops.iter().enumerate() {
            if *op == Op::Select(true) {
                assert!(
                    matches!(ops[i - 1], Op::Mode(_)),
                    "select asserted without setting the mode line first"
                );
            }
        }
    }

    #[test]
    fn test_select_deasserts_between_bytes() {
        let mut d = driver();
        block_on(d.set_column_address(0x10)).unwrap();
        let selects: Vec<bool> = d
            .iface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Select(s) => Some(*s),
                _ => None,
            })
            .collect();
        // Two command bytes: select must fully cycle for each.
        assert_eq!(selects, vec![true, false, true, false]);
    }

    #[test]
    fn test_command_settle_after_each_byte() {
        let mut d = driver();
        block_on(d.write_command(0xA4)).unwrap();
        assert_eq!(d.iface.ops.last(), Some(&Op::DelayUs(COMMAND_SETTLE_US)));
    }

    #[test]
    fn test_write_data_uses_data_mode() {
        let mut d = driver();
        block_on(d.write_data(0x5A)).unwrap();
        assert_eq!(d.iface.ops[0], Op::Mode(Mode::Data));
        assert_eq!(bytes_in_mode(&d.iface.ops, Mode::Data), vec![0x5A]);
    }

    #[test]
    fn test_write_page_sequence() {
        let mut d = driver();
        let data = [0xAAu8; 16];
        block_on(d.write_page(1, 2, &data)).unwrap();

        // Addressing commands first: page, column high nibble, column low.
        assert_eq!(
            bytes_in_mode(&d.iface.ops, Mode::Command),
            vec![PAGE_START | 1, COLUMN_HIGH_NIBBLE, COLUMN_LOW_NIBBLE | 2]
        );

        // Then exactly one bulk transfer, inside a single select window.
        let tail = &d.iface.ops[d.iface.ops.len() - 6..];
        assert_eq!(
            tail,
            &[
                Op::Mode(Mode::Data),
                Op::Select(true),
                Op::DelayUs(SELECT_GUARD_US),
                Op::Bulk(data.to_vec()),
                Op::DelayUs(SELECT_GUARD_US),
                Op::Select(false),
            ]
        );
        let bulk_count = d
            .iface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Bulk(_)))
            .count();
        assert_eq!(bulk_count, 1);
    }

    #[test]
    fn test_write_page_empty_is_noop() {
        let mut d = driver();
        assert_eq!(block_on(d.write_page(0, 0, &[])), Ok(()));
        assert!(
            d.iface.ops.is_empty(),
            "zero-width page write must not touch any line"
        );
    }

    #[test]
    fn test_write_page_timeout_reported_and_released() {
        let mut d = driver();
        d.iface.fail_bulk = true;
        let result = block_on(d.write_page(0, 0, &[0xFF; 8]));
        assert_eq!(result, Err(DisplayError::TransferTimeout));
        // Select must not be left asserted after a stalled transfer.
        assert_eq!(d.iface.ops.last(), Some(&Op::Select(false)));
    }

    #[test]
    fn test_address_masking() {
        let mut d = driver();
        block_on(d.set_page_address(0xFF)).unwrap();
        block_on(d.set_column_address(0xFF)).unwrap();
        block_on(d.set_display_start_line(0xFF)).unwrap();
        assert_eq!(
            bytes_in_mode(&d.iface.ops, Mode::Command),
            vec![
                PAGE_START | 0x0F,
                COLUMN_HIGH_NIBBLE | 0x07,
                COLUMN_LOW_NIBBLE | 0x0F,
                SET_START_LINE | 0x3F,
            ]
        );
    }

    #[test]
    fn test_invert_toggle() {
        let mut d = driver();
        block_on(d.set_invert(true)).unwrap();
        block_on(d.set_invert(false)).unwrap();
        assert_eq!(
            bytes_in_mode(&d.iface.ops, Mode::Command),
            vec![INVERT_DISPLAY, NORMAL_DISPLAY]
        );
    }

    #[test]
    fn test_display_on_off() {
        let mut d = driver();
        block_on(d.display_off()).unwrap();
        block_on(d.display_on()).unwrap();
        assert_eq!(
            bytes_in_mode(&d.iface.ops, Mode::Command),
            vec![DISPLAY_OFF, DISPLAY_ON]
        );
    }
}
