use crate::func::StaticFn;

/// closure bound as an interrupt handler, invoked in interrupt context
pub type Handler = StaticFn<(), 2>;

/// hardware interrupt source, numbered like the vendor's vector table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IrqId(pub u16);

/**
    binds closures to hardware interrupt sources

    the driver registers one handler per dma stream plus one for the uart
    line status at construction and never rebinds them. handlers stay bound
    for the life of the driver.
*/
pub trait InterruptRegistrar {
    fn bind(&self, irq: IrqId, handler: Handler);
}
