// ─── Executable header inspection ───
// Reads the architecture straight from PE / ELF / Mach-O headers so the
// runtime does not have to be started.

use std::path::Path;

use goblin::mach::Mach;
use goblin::Object;
use tracing::debug;

use super::installation::Architecture;

pub fn architecture_of_file(path: &Path) -> Architecture {
    match std::fs::read(path) {
        Ok(bytes) => architecture_of_bytes(&bytes),
        Err(err) => {
            debug!("Cannot read {:?} for header inspection: {}", path, err);
            Architecture::Unknown
        }
    }
}

pub fn architecture_of_bytes(bytes: &[u8]) -> Architecture {
    match Object::parse(bytes) {
        Ok(Object::Elf(elf)) => elf_machine(elf.header.e_machine),
        Ok(Object::PE(pe)) => pe_machine(pe.header.coff_header.machine),
        Ok(Object::Mach(Mach::Binary(macho))) => mach_cpu(macho.header.cputype),
        Ok(Object::Mach(Mach::Fat(fat))) => {
            let slices: Vec<Architecture> = fat
                .arches()
                .map(|arches| arches.iter().map(|a| mach_cpu(a.cputype)).collect())
                .unwrap_or_default();
            let host = Architecture::host();
            if slices.contains(&host) {
                host
            } else {
                slices.into_iter().next().unwrap_or(Architecture::Unknown)
            }
        }
        Ok(_) => Architecture::Unknown,
        Err(err) => {
            debug!("Unrecognized executable header: {}", err);
            Architecture::Unknown
        }
    }
}

fn elf_machine(machine: u16) -> Architecture {
    use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64};
    match machine {
        EM_X86_64 => Architecture::X64,
        EM_386 => Architecture::X86,
        EM_AARCH64 => Architecture::Arm64,
        EM_ARM => Architecture::Arm,
        _ => Architecture::Unknown,
    }
}

fn pe_machine(machine: u16) -> Architecture {
    use goblin::pe::header::{
        COFF_MACHINE_ARM64, COFF_MACHINE_ARMNT, COFF_MACHINE_X86, COFF_MACHINE_X86_64,
    };
    match machine {
        COFF_MACHINE_X86_64 => Architecture::X64,
        COFF_MACHINE_X86 => Architecture::X86,
        COFF_MACHINE_ARM64 => Architecture::Arm64,
        COFF_MACHINE_ARMNT => Architecture::Arm,
        _ => Architecture::Unknown,
    }
}

fn mach_cpu(cputype: u32) -> Architecture {
    use goblin::mach::cputype::{CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64};
    match cputype {
        CPU_TYPE_X86_64 => Architecture::X64,
        CPU_TYPE_X86 => Architecture::X86,
        CPU_TYPE_ARM64 => Architecture::Arm64,
        CPU_TYPE_ARM => Architecture::Arm,
        _ => Architecture::Unknown,
    }
}
