//! Lookup of parts inside the ZIP container shared by `.xlsx` and `.ods` files.

use crate::error::SheetError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Returns true if the archive holds a part called `name`.
    fn contains(&self, name: &str) -> bool;

    /// Opens the part called `name`, matching case-insensitively and
    /// treating `\` as `/`.
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetError>;

    /// Opens the part called `name` as an XML event stream.
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetError>;
}

fn find_name<'a>(mut names: impl Iterator<Item = &'a str>, name: &str) -> Option<String> {
    let pattern = name.replace('\\', "/");
    names
        .find(|candidate| pattern.eq_ignore_ascii_case(&candidate.replace('\\', "/")))
        .map(str::to_owned)
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn contains(&self, name: &str) -> bool {
        find_name(self.file_names(), name).is_some()
    }

    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetError> {
        let Some(path) = find_name(self.file_names(), name) else {
            return Ok(None);
        };
        match self.by_name(&path) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetError> {
        Ok(self.part(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip_fixture;
    use std::io::Cursor;

    #[test]
    fn finds_parts_case_insensitively() {
        let bytes = zip_fixture(&[("XL/Workbook.xml", "<workbook/>")]);
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert!(zip.contains("xl/workbook.xml"));
        assert!(zip.contains("xl\\workbook.xml"));
        assert!(!zip.contains("xl/styles.xml"));

        let mut content = String::new();
        zip.part("xl/workbook.xml")
            .unwrap()
            .expect("part present")
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<workbook/>");
        assert!(zip.part("content.xml").unwrap().is_none());
    }
}
