//! Scheduler configuration mutations (`PUT ws/v1/cluster/scheduler-conf`).

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
    AddQueue(String, Vec<(String, String)>),
    UpdateQueue(String, Vec<(String, String)>),
    RemoveQueue(String),
}

/// A `<sched-conf>` document.
///
/// Queue operations are rendered in the order they were added. Global
/// updates share a single `<global-updates>` element placed where the first
/// one was added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRequest {
    mutations: Vec<Mutation>,
    global: Vec<(String, String)>,
    global_position: Option<usize>,
}

impl MutationRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queue with the given parameters.
    pub fn add_queue(&mut self, queue: &str, params: &[(&str, &str)]) -> &mut Self {
        self.mutations.push(Mutation::AddQueue(queue.to_string(), owned(params)));
        self
    }

    /// Change parameters of an existing queue.
    pub fn update_queue(&mut self, queue: &str, params: &[(&str, &str)]) -> &mut Self {
        self.mutations.push(Mutation::UpdateQueue(queue.to_string(), owned(params)));
        self
    }

    /// Remove a queue.
    pub fn remove_queue(&mut self, queue: &str) -> &mut Self {
        self.mutations.push(Mutation::RemoveQueue(queue.to_string()));
        self
    }

    /// Set a scheduler-wide property.
    pub fn global_update(&mut self, key: &str, value: &str) -> &mut Self {
        if self.global_position.is_none() {
            self.global_position = Some(self.mutations.len());
        }
        self.global.push((key.to_string(), value.to_string()));
        self
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.global.is_empty()
    }

    /// Render the request, indented by two spaces when `pretty`.
    pub fn to_xml(&self, pretty: bool) -> Result<String> {
        let mut writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };

        start(&mut writer, "sched-conf")?;
        for (i, mutation) in self.mutations.iter().enumerate() {
            if self.global_position == Some(i) {
                self.write_global(&mut writer)?;
            }
            match mutation {
                Mutation::AddQueue(queue, params) => write_queue(&mut writer, "add-queue", queue, params)?,
                Mutation::UpdateQueue(queue, params) => {
                    write_queue(&mut writer, "update-queue", queue, params)?
                }
                Mutation::RemoveQueue(queue) => text_element(&mut writer, "remove-queue", queue)?,
            }
        }
        if self.global_position == Some(self.mutations.len()) {
            self.write_global(&mut writer)?;
        }
        end(&mut writer, "sched-conf")?;

        String::from_utf8(writer.into_inner()).map_err(|e| Error::Other(e.to_string()))
    }

    fn write_global(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        start(writer, "global-updates")?;
        for (key, value) in &self.global {
            write_entry(writer, key, value)?;
        }
        end(writer, "global-updates")
    }
}

fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn write_queue(writer: &mut Writer<Vec<u8>>, tag: &str, queue: &str, params: &[(String, String)]) -> Result<()> {
    start(writer, tag)?;
    text_element(writer, "queue-name", queue)?;
    start(writer, "params")?;
    for (key, value) in params {
        write_entry(writer, key, value)?;
    }
    end(writer, "params")?;
    end(writer, tag)
}

fn write_entry(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<()> {
    start(writer, "entry")?;
    text_element(writer, "key", key)?;
    text_element(writer, "value", value)?;
    end(writer, "entry")
}

fn text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    start(writer, tag)?;
    write(writer, Event::Text(BytesText::new(text)))?;
    end(writer, tag)
}

fn start(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(tag)))
}

fn end(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Other(format!("cannot render scheduler mutation: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_queue() {
        let mut mutation = MutationRequest::new();
        mutation
            .update_queue("root.test-queue1", &[("test", "hello1"), ("test2", "hello2")])
            .update_queue("root.test-queue2", &[("test", "hello3")]);
        assert_eq!(
            mutation.to_xml(true).unwrap(),
            "\
<sched-conf>
  <update-queue>
    <queue-name>root.test-queue1</queue-name>
    <params>
      <entry>
        <key>test</key>
        <value>hello1</value>
      </entry>
      <entry>
        <key>test2</key>
        <value>hello2</value>
      </entry>
    </params>
  </update-queue>
  <update-queue>
    <queue-name>root.test-queue2</queue-name>
    <params>
      <entry>
        <key>test</key>
        <value>hello3</value>
      </entry>
    </params>
  </update-queue>
</sched-conf>"
        );
    }

    #[test]
    fn test_remove_queue() {
        let mut mutation = MutationRequest::new();
        mutation.remove_queue("root.test-queue1").remove_queue("root.test-queue2");
        assert_eq!(
            mutation.to_xml(true).unwrap(),
            "\
<sched-conf>
  <remove-queue>root.test-queue1</remove-queue>
  <remove-queue>root.test-queue2</remove-queue>
</sched-conf>"
        );
    }

    #[test]
    fn test_global_updates_share_one_element() {
        let mut mutation = MutationRequest::new();
        mutation.global_update("key1", "value1").global_update("key2", "value2");
        assert_eq!(
            mutation.to_xml(true).unwrap(),
            "\
<sched-conf>
  <global-updates>
    <entry>
      <key>key1</key>
      <value>value1</value>
    </entry>
    <entry>
      <key>key2</key>
      <value>value2</value>
    </entry>
  </global-updates>
</sched-conf>"
        );
    }

    #[test]
    fn test_combined_compact() {
        let mut mutation = MutationRequest::new();
        mutation
            .add_queue("root.a", &[("capacity", "10")])
            .update_queue("root.default", &[("capacity", "90")]);
        assert_eq!(
            mutation.to_xml(false).unwrap(),
            "<sched-conf><add-queue><queue-name>root.a</queue-name><params><entry><key>capacity</key>\
<value>10</value></entry></params></add-queue><update-queue><queue-name>root.default</queue-name>\
<params><entry><key>capacity</key><value>90</value></entry></params></update-queue></sched-conf>"
        );
    }

    #[test]
    fn test_escapes_text() {
        let mut mutation = MutationRequest::new();
        mutation.global_update("acl", "a&b");
        assert!(mutation.to_xml(false).unwrap().contains("<value>a&amp;b</value>"));
    }
}
