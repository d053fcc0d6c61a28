use crate::core::model::ItemMeta;

/// Raw observation produced by a tap. Consumed immediately by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSignal {
    /// Early metadata from the pre-flight probe.
    Probe { title: Option<String> },
    ByteProgress { downloaded: u64, total: Option<u64>, meta: ItemMeta },
    Lifecycle { marker: LifecycleMarker, meta: ItemMeta },
    TextLine(TextSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMarker {
    Started,
    Destination,
    Finished,
    PostProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSignal {
    Destination { filename: String },
    PostProcess,
    Percent(u8),
}
