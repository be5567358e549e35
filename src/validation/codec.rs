//! Codec that validates every decoded request message.

use std::marker::PhantomData;
use std::sync::Arc;

use tonic::codec::{BufferSettings, Codec, DecodeBuf, Decoder, ProstCodec};
use tonic::Status;

use super::{invalid_argument, MessageTemplates, Validate};

/// `ProstCodec` whose decoder rejects messages failing [`Validate`].
///
/// Applies to unary and streamed requests alike, since both decode
/// through the same decoder.
pub struct ValidatingCodec<T, U> {
    templates: Arc<MessageTemplates>,
    _marker: PhantomData<(T, U)>,
}

impl<T, U> ValidatingCodec<T, U> {
    /// Codec keeping each violation's own message.
    pub fn new() -> Self {
        Self::with_templates(Arc::new(MessageTemplates::new()))
    }

    /// Codec localizing violation messages.
    pub fn with_templates(templates: Arc<MessageTemplates>) -> Self {
        Self {
            templates,
            _marker: PhantomData,
        }
    }
}

impl<T, U> Default for ValidatingCodec<T, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, U> Codec for ValidatingCodec<T, U>
where
    T: prost::Message + Send + 'static,
    U: prost::Message + Default + Validate + Send + 'static,
{
    type Encode = T;
    type Decode = U;
    type Encoder = <ProstCodec<T, U> as Codec>::Encoder;
    type Decoder = ValidatingDecoder<U>;

    fn encoder(&mut self) -> Self::Encoder {
        ProstCodec::<T, U>::default().encoder()
    }

    fn decoder(&mut self) -> Self::Decoder {
        ValidatingDecoder {
            inner: ProstCodec::<U, U>::default().decoder(),
            templates: Arc::clone(&self.templates),
        }
    }
}

/// Decoder produced by [`ValidatingCodec`].
pub struct ValidatingDecoder<U>
where
    U: prost::Message + Default + Send + 'static,
{
    inner: <ProstCodec<U, U> as Codec>::Decoder,
    templates: Arc<MessageTemplates>,
}

impl<U> Decoder for ValidatingDecoder<U>
where
    U: prost::Message + Default + Validate + Send + 'static,
{
    type Item = U;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<U>, Status> {
        let item = self.inner.decode(src)?;
        if let Some(message) = &item {
            let violations = message.validate();
            if !violations.is_empty() {
                return Err(invalid_argument(violations, &self.templates));
            }
        }
        Ok(item)
    }

    fn buffer_settings(&self) -> BufferSettings {
        self.inner.buffer_settings()
    }
}
