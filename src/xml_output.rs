use crate::err::{SerializationError, SerializationResult};
use crate::evt_parser::ParserSettings;
use crate::evt_record::EventRecord;
use crate::json_output::hex_string;

use log::trace;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Display;
use std::io::Write;

fn xml_error(err: impl Display) -> SerializationError {
    SerializationError::XmlOutputError {
        message: err.to_string(),
    }
}

/// Writes records as `<Event>` elements, laid out like the Windows event viewer's XML view.
pub struct XmlOutput<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlOutput<W> {
    pub fn with_writer(target: W, settings: &ParserSettings) -> Self {
        let writer = if settings.should_indent() {
            Writer::new_with_indent(target, b' ', 2)
        } else {
            Writer::new(target)
        };

        XmlOutput { writer }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn start(&mut self, element: BytesStart) -> SerializationResult<()> {
        self.writer
            .write_event(Event::Start(element))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> SerializationResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn empty(&mut self, element: BytesStart) -> SerializationResult<()> {
        self.writer
            .write_event(Event::Empty(element))
            .map_err(xml_error)
    }

    fn text_element(&mut self, element: BytesStart, value: &str) -> SerializationResult<()> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.start(element)?;
        self.writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error)?;
        self.end(&name)
    }

    pub fn write_record(&mut self, record: &EventRecord) -> SerializationResult<()> {
        trace!("Writing record {} as XML", record.record_number);

        let source_name = record.source_name()?;
        let computer_name = record.computer_name()?;
        let created = record.creation_timestamp()?.to_string();
        let written = record.written_timestamp()?.to_string();
        let user_sid = record.user_sid()?.map(|sid| sid.to_string());

        self.start(BytesStart::new("Event"))?;
        self.start(BytesStart::new("System"))?;

        self.empty(BytesStart::new("Provider").with_attributes([("Name", source_name.as_str())]))?;

        let qualifiers = record.event_identifier.qualifiers().to_string();
        self.text_element(
            BytesStart::new("EventID").with_attributes([("Qualifiers", qualifiers.as_str())]),
            &record.event_identifier.code().to_string(),
        )?;
        self.text_element(
            BytesStart::new("Level"),
            &record.event_type.to_string(),
        )?;
        self.text_element(
            BytesStart::new("Task"),
            &record.event_category.to_string(),
        )?;
        self.empty(BytesStart::new("TimeCreated").with_attributes([("SystemTime", created.as_str())]))?;
        self.empty(BytesStart::new("TimeWritten").with_attributes([("SystemTime", written.as_str())]))?;
        self.text_element(
            BytesStart::new("EventRecordID"),
            &record.record_number.to_string(),
        )?;
        self.text_element(BytesStart::new("Computer"), &computer_name)?;

        match user_sid {
            Some(sid) => {
                self.empty(BytesStart::new("Security").with_attributes([("UserID", sid.as_str())]))?
            }
            None => self.empty(BytesStart::new("Security"))?,
        }

        self.end("System")?;
        self.start(BytesStart::new("EventData"))?;

        if let Some(strings) = record.strings() {
            for value in strings.iter() {
                self.text_element(BytesStart::new("Data"), &value?)?;
            }
        }
        if !record.data().is_empty() {
            self.text_element(BytesStart::new("Binary"), &hex_string(record.data()))?;
        }

        self.end("EventData")?;
        self.end("Event")
    }
}
