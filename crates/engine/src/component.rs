use crate::CapabilitySlot;

/// A value whose remote dependencies are filled in by the [`Binder`](crate::Binder).
///
/// ```rust,ignore
/// struct Checkout {
///     pricing: Slot<RemoteFunction<QuoteRequest, Quote>>,
///     audit: Slot<RemoteConsumer<AuditEvent>>,
/// }
///
/// impl Component for Checkout {
///     fn capability_slots(&mut self) -> Vec<&mut dyn CapabilitySlot> {
///         vec![&mut self.pricing as &mut dyn CapabilitySlot, &mut self.audit]
///     }
/// }
/// ```
pub trait Component {
    /// Every capability slot declared by this component.
    fn capability_slots(&mut self) -> Vec<&mut dyn CapabilitySlot>;

    /// The component this one wraps, if it is a proxy or decorator.
    ///
    /// The binder unwraps exactly one level and binds the inner slots.
    fn inner(&mut self) -> Option<&mut dyn Component> {
        None
    }

    /// Name used in logs and bind errors.
    fn component_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
