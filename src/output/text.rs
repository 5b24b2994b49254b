//! Human-readable report.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::duplicates::{CacheReport, DuplicateGroup, ScanSummary};

/// Plain-text rendering of a scan for the terminal.
#[derive(Debug)]
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
    summary: &'a ScanSummary,
    cache: &'a CacheReport,
}

impl<'a> TextOutput<'a> {
    #[must_use]
    pub fn new(
        groups: &'a [DuplicateGroup],
        summary: &'a ScanSummary,
        cache: &'a CacheReport,
    ) -> Self {
        Self {
            groups,
            summary,
            cache,
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (n, group) in self.groups.iter().enumerate() {
            writeln!(
                writer,
                "Group {} ({} files, {} each, {} total)",
                n + 1,
                group.len(),
                ByteSize(group.size()),
                ByteSize(group.total_size)
            )?;
            writeln!(writer, "  hash: {}", group.hash)?;
            for file in &group.files {
                writeln!(writer, "  {}", file.path.display())?;
            }
            writeln!(writer)?;
        }

        self.write_summary(writer)
    }

    fn write_summary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let s = self.summary;
        if s.cancelled {
            writeln!(writer, "Scan cancelled, no results.")?;
        }
        writeln!(
            writer,
            "Scanned {} files ({}), {} candidates after size grouping",
            s.total_files,
            s.total_size_display(),
            s.candidates
        )?;
        if let Some(strategy) = s.strategy {
            writeln!(
                writer,
                "Strategy: {} ({} partial, {} full hashes, {} failed)",
                strategy, s.partial_hashes, s.full_hashes, s.hash_failures
            )?;
        }
        writeln!(
            writer,
            "Found {} duplicate groups with {} redundant copies",
            s.duplicate_groups, s.duplicate_files
        )?;
        writeln!(
            writer,
            "Wasted space: {} ({:.1}%)",
            s.reclaimable_display(),
            s.wasted_percentage()
        )?;

        if self.cache.enabled {
            writeln!(
                writer,
                "Cache: {} hits, {} misses ({:.1}% hit rate)",
                self.cache.hits, self.cache.misses, self.cache.hit_rate
            )?;
        }

        let (issues, text) = s.permission_summary();
        if issues > 0 {
            writeln!(writer, "{}", text)?;
        }
        writeln!(writer, "Completed in {:.2?}", s.duration)
    }
}

/// Render the store statistics shown by `--cache-stats`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_cache_report<W: Write>(writer: &mut W, report: &CacheReport) -> io::Result<()> {
    if !report.enabled {
        return writeln!(writer, "Cache is disabled");
    }
    writeln!(writer, "Entries:   {}", report.total_entries)?;
    writeln!(writer, "Data size: {}", ByteSize(report.total_size))?;
    writeln!(writer, "Store:     {}", report.db_size_display())?;
    if let Some(oldest) = report.oldest_entry {
        writeln!(writer, "Oldest:    {}", oldest.to_rfc3339())?;
    }
    if let Some(newest) = report.newest_entry {
        writeln!(writer, "Newest:    {}", newest.to_rfc3339())?;
    }
    Ok(())
}
