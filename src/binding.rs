/*!
    static identity of the uart peripherals

    pin assignments resolve to a logical uart instance, and each instance
    resolves to its pair of dma stream bindings and its interrupt sources.
    everything here is a fixed table of the chip, selected once at driver
    construction and immutable afterwards.
*/

use crate::irq::IrqId;

/// logical uart instances of the chip
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UartId {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

/// uart-capable pins, named port letter + index
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinName {
    PA0,
    PA1,
    PA2,
    PA3,
    PA9,
    PA10,
    PB6,
    PB7,
    PB10,
    PB11,
    PC6,
    PC7,
    PC10,
    PC11,
    PC12,
    PD2,
    PD5,
    PD6,
    PD8,
    PD9,
    PG9,
    PG14,
}

/// dma stream serving one direction of a uart
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaBinding {
    /// dma controller instance, 1 or 2
    pub controller: u8,
    pub stream: u8,
    /// request channel multiplexed onto the stream
    pub channel: u8,
    /// interrupt source of the stream
    pub irq: IrqId,
}

const fn bind(controller: u8, stream: u8, channel: u8, irq: u16) -> DmaBinding {
    DmaBinding {
        controller,
        stream,
        channel,
        irq: IrqId(irq),
    }
}

/// (tx, rx) dma bindings of a uart instance
pub const fn dma_bindings(uart: UartId) -> (DmaBinding, DmaBinding) {
    match uart {
        UartId::Usart1 => (bind(2, 7, 4, 70), bind(2, 2, 4, 58)),
        UartId::Usart2 => (bind(1, 6, 4, 17), bind(1, 5, 4, 16)),
        UartId::Usart3 => (bind(1, 3, 4, 14), bind(1, 1, 4, 12)),
        UartId::Uart4 => (bind(1, 4, 4, 15), bind(1, 2, 4, 13)),
        UartId::Uart5 => (bind(1, 7, 4, 47), bind(1, 0, 4, 11)),
        UartId::Usart6 => (bind(2, 6, 5, 69), bind(2, 1, 5, 57)),
    }
}

/// interrupt source of the uart peripheral itself (line status, idle)
pub const fn line_irq(uart: UartId) -> IrqId {
    match uart {
        UartId::Usart1 => IrqId(37),
        UartId::Usart2 => IrqId(38),
        UartId::Usart3 => IrqId(39),
        UartId::Uart4 => IrqId(52),
        UartId::Uart5 => IrqId(53),
        UartId::Usart6 => IrqId(71),
    }
}

const TX_PINS: &[(PinName, UartId)] = &[
    (PinName::PA9, UartId::Usart1),
    (PinName::PB6, UartId::Usart1),
    (PinName::PA2, UartId::Usart2),
    (PinName::PD5, UartId::Usart2),
    (PinName::PB10, UartId::Usart3),
    (PinName::PC10, UartId::Usart3),
    (PinName::PD8, UartId::Usart3),
    (PinName::PA0, UartId::Uart4),
    (PinName::PC12, UartId::Uart5),
    (PinName::PC6, UartId::Usart6),
    (PinName::PG14, UartId::Usart6),
];

const RX_PINS: &[(PinName, UartId)] = &[
    (PinName::PA10, UartId::Usart1),
    (PinName::PB7, UartId::Usart1),
    (PinName::PA3, UartId::Usart2),
    (PinName::PD6, UartId::Usart2),
    (PinName::PB11, UartId::Usart3),
    (PinName::PC11, UartId::Usart3),
    (PinName::PD9, UartId::Usart3),
    (PinName::PA1, UartId::Uart4),
    (PinName::PD2, UartId::Uart5),
    (PinName::PC7, UartId::Usart6),
    (PinName::PG9, UartId::Usart6),
];

fn lookup(pin: PinName, table: &[(PinName, UartId)]) -> Option<UartId> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == pin)
        .map(|(_, uart)| *uart)
}

pub fn uart_for_tx(pin: PinName) -> Option<UartId> {
    lookup(pin, TX_PINS)
}

pub fn uart_for_rx(pin: PinName) -> Option<UartId> {
    lookup(pin, RX_PINS)
}

/// resolve the uart serving the given pin pair; disagreement between the
/// two pins, or a pin with no uart function, is a wiring error and fatal
pub fn merge_pins(tx: Option<PinName>, rx: Option<PinName>) -> UartId {
    let tx = tx.map(|pin| {
        let Some(uart) = uart_for_tx(pin) else {
            panic!("pin {pin:?} has no uart tx function")
        };
        uart
    });
    let rx = rx.map(|pin| {
        let Some(uart) = uart_for_rx(pin) else {
            panic!("pin {pin:?} has no uart rx function")
        };
        uart
    });
    match (tx, rx) {
        (Some(tx), Some(rx)) => {
            assert!(tx == rx, "tx and rx pins belong to different uarts");
            tx
        }
        (Some(uart), None) | (None, Some(uart)) => uart,
        (None, None) => panic!("neither tx nor rx pin assigned"),
    }
}
