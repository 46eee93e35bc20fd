use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

use crate::errors::OutputError;
use crate::util::extract_tagged_block;

const ROOT: &str = "developer_output";

/// One generated file. `content` is kept verbatim (including any `<code>`
/// wrapper); cleanup happens when the file is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

/// Parsed `<developer_output>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeveloperOutput {
    pub project_structure: Vec<String>,
    pub setup: String,
    pub files: Vec<ProjectFile>,
    pub run_deploy_steps: String,
    pub misc_content: String,
    pub project_creation_command: String,
}

impl DeveloperOutput {
    /// Parse a developer response. Prose and code fences around the
    /// document are ignored.
    ///
    /// Fails on a wrong root element, on XML syntax errors and on documents
    /// that end while elements are still open. Nothing partial is returned.
    pub fn parse(response: &str) -> Result<Self, OutputError> {
        let xml = match extract_tagged_block(response, ROOT) {
            Some(block) => block,
            None => {
                let trimmed = response.trim();
                if !trimmed.starts_with('<') {
                    return Err(OutputError::MissingXml);
                }
                trimmed
            }
        };
        parse_document(xml)
    }

    /// Fold `other` into `self`. Directories are deduplicated, files with
    /// a path already present replace the earlier content in place, text
    /// sections are appended.
    pub fn merge(&mut self, other: DeveloperOutput) {
        for dir in other.project_structure {
            if !self.project_structure.contains(&dir) {
                self.project_structure.push(dir);
            }
        }
        for file in other.files {
            match self.files.iter_mut().find(|f| f.path == file.path) {
                Some(existing) => existing.content = file.content,
                None => self.files.push(file),
            }
        }
        append_section(&mut self.setup, other.setup);
        append_section(&mut self.run_deploy_steps, other.run_deploy_steps);
        append_section(&mut self.misc_content, other.misc_content);
        append_section(
            &mut self.project_creation_command,
            other.project_creation_command,
        );
    }

    /// Shell commands to run the project: the lines of `setup` followed by
    /// the lines of `run_deploy_steps`, skipping blanks, `#` comments and
    /// markdown fences.
    pub fn commands(&self) -> Vec<String> {
        self.setup
            .lines()
            .chain(self.run_deploy_steps.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
            .map(str::to_string)
            .collect()
    }
}

fn append_section(target: &mut String, addition: String) {
    if addition.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(&addition);
}

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> OutputError {
    OutputError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

fn parse_document(xml: &str) -> Result<DeveloperOutput, OutputError> {
    let mut reader = Reader::from_str(xml);
    let mut out = DeveloperOutput::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut file_path: Option<String> = None;
    let mut file_content: Option<String> = None;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if !seen_root {
                    if name != ROOT {
                        return Err(OutputError::WrongRoot { found: name });
                    }
                    seen_root = true;
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(empty) => {
                if !seen_root {
                    let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                    if name != ROOT {
                        return Err(OutputError::WrongRoot { found: name });
                    }
                    return Ok(out);
                }
            }
            Event::Text(t) => {
                let unescaped = t.unescape().map_err(|e| xml_error(&reader, e))?;
                text.push_str(&unescaped);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                match path.as_slice() {
                    [ROOT] => return Ok(out),
                    [ROOT, "project_structure", "dir"] => {
                        let dir = text.trim();
                        if !dir.is_empty() {
                            out.project_structure.push(dir.to_string());
                        }
                    }
                    [ROOT, "setup"] => out.setup = text.trim().to_string(),
                    [ROOT, "run_deploy_steps"] => out.run_deploy_steps = text.trim().to_string(),
                    [ROOT, "misc_content"] => out.misc_content = text.trim().to_string(),
                    [ROOT, "project_creation_command"] => {
                        out.project_creation_command = text.trim().to_string()
                    }
                    [ROOT, "files", "file", "path"] => file_path = Some(text.trim().to_string()),
                    [ROOT, "files", "file", "content"] => file_content = Some(text.clone()),
                    [ROOT, "files", "file"] => {
                        if let (Some(path), Some(content)) = (file_path.take(), file_content.take())
                        {
                            out.files.push(ProjectFile { path, content });
                        }
                    }
                    _ => {}
                }
                stack.pop();
                text.clear();
            }
            Event::Eof => {
                return Err(match stack.last() {
                    Some(open) => OutputError::Truncated { open: open.clone() },
                    None => OutputError::MissingXml,
                });
            }
            _ => {}
        }
    }
}
